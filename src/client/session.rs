//! Session-active marker consulted by the auto-connect decision.

use std::fs;
use std::path::PathBuf;

/// Records that a live stream was active, so a relaunch resumes watching
/// without an explicit connect. Best-effort: a read-only filesystem just
/// means the marker never reports active.
#[derive(Debug, Clone)]
pub struct SessionMarker {
    path: PathBuf,
}

impl SessionMarker {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn mark_active(&self) {
        let _ = fs::write(&self.path, b"active");
    }

    pub fn clear(&self) {
        let _ = fs::remove_file(&self.path);
    }

    pub fn was_active(&self) -> bool {
        self.path.exists()
    }
}

/// Connect automatically iff launched on the primary surface or a previous
/// session left the stream active.
pub fn should_auto_connect(on_primary: bool, marker: &SessionMarker) -> bool {
    on_primary || marker.was_active()
}

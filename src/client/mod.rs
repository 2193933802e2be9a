//! Watcher side: stream consumption, event persistence, session state.

pub mod parser;
pub mod session;
pub mod store;
pub mod stream;

pub use session::{should_auto_connect, SessionMarker};
pub use store::EventStore;
pub use stream::{ConnectionStatus, ReceivedEvent, StreamClient, StreamSettings};

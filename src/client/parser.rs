//! Incremental parser for the SSE wire format.

/// One decoded server-push message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SseMessage {
    pub id: Option<String>,
    /// Event name; `message` when the server sent none.
    pub event: String,
    pub data: String,
}

/// Accumulates raw transport chunks and yields complete messages.
///
/// Chunk boundaries are arbitrary: a frame may arrive split across reads, and
/// one read may carry several frames. Comment lines (leading `:`) are
/// discarded here; the transport layer already counts their bytes as
/// heartbeat activity.
#[derive(Debug, Default)]
pub struct FrameParser {
    buffer: Vec<u8>,
    id: Option<String>,
    event: Option<String>,
    data_lines: Vec<String>,
}

impl FrameParser {
    /// Feed a chunk; returns every message completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseMessage> {
        self.buffer.extend_from_slice(chunk);
        let mut messages = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = self.buffer.drain(..=pos).collect();
            let mut line = String::from_utf8_lossy(&line_bytes[..line_bytes.len() - 1]).into_owned();
            if line.ends_with('\r') {
                line.pop();
            }
            if let Some(message) = self.take_line(&line) {
                messages.push(message);
            }
        }

        messages
    }

    fn take_line(&mut self, line: &str) -> Option<SseMessage> {
        if line.is_empty() {
            return self.flush();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "id" => self.id = Some(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "data" => self.data_lines.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn flush(&mut self) -> Option<SseMessage> {
        if self.id.is_none() && self.event.is_none() && self.data_lines.is_empty() {
            return None;
        }
        Some(SseMessage {
            id: self.id.take(),
            event: self.event.take().unwrap_or_else(|| "message".to_string()),
            data: std::mem::take(&mut self.data_lines).join("\n"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_frame() {
        let mut parser = FrameParser::default();
        let messages = parser.push(b"id: 7\nevent: webhook\ndata: {\"a\":1}\n\n");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id.as_deref(), Some("7"));
        assert_eq!(messages[0].event, "webhook");
        assert_eq!(messages[0].data, "{\"a\":1}");
    }

    #[test]
    fn frame_split_across_chunks() {
        let mut parser = FrameParser::default();
        assert!(parser.push(b"id: 1\nevent: web").is_empty());
        assert!(parser.push(b"hook\ndata: x").is_empty());
        let messages = parser.push(b"\n\n");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].event, "webhook");
        assert_eq!(messages[0].data, "x");
    }

    #[test]
    fn two_frames_in_one_chunk() {
        let mut parser = FrameParser::default();
        let messages = parser.push(b"event: a\ndata: 1\n\nevent: b\ndata: 2\n\n");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].event, "a");
        assert_eq!(messages[1].event, "b");
    }

    #[test]
    fn multi_line_data_joined_with_newline() {
        let mut parser = FrameParser::default();
        let messages = parser.push(b"data: one\ndata: two\n\n");
        assert_eq!(messages[0].data, "one\ntwo");
    }

    #[test]
    fn comment_only_frame_yields_nothing() {
        let mut parser = FrameParser::default();
        assert!(parser.push(b": keepalive\n\n").is_empty());
    }

    #[test]
    fn missing_event_defaults_to_message() {
        let mut parser = FrameParser::default();
        let messages = parser.push(b"data: hi\n\n");
        assert_eq!(messages[0].event, "message");
    }

    #[test]
    fn crlf_line_endings() {
        let mut parser = FrameParser::default();
        let messages = parser.push(b"event: webhook\r\ndata: x\r\n\r\n");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].data, "x");
    }
}

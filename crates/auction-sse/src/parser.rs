//! Minimal SSE (text/event-stream) line parser.
//!
//! No crate in this workspace's ecosystem speaks SSE, so events are parsed
//! by hand over a raw byte stream: accumulate lines until a blank line
//! terminates one event, per the `text/event-stream` wire format (`event:`,
//! `data:`, `id:`, `:` comment lines).

/// One parsed raw SSE event, before the tracker decides what to do with it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSseEvent {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

/// Incrementally feeds bytes into an SSE event accumulator and yields
/// complete events as they're terminated by a blank line.
#[derive(Default)]
pub struct SseLineParser {
    buffer: String,
    current: RawSseEvent,
    data_lines: Vec<String>,
}

impl SseLineParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes (as received off the wire); returns any
    /// complete events found in this chunk plus whatever was pending.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<RawSseEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));
        let mut events = Vec::new();

        loop {
            let Some(newline_pos) = self.buffer.find('\n') else {
                break;
            };
            let line: String = self.buffer.drain(..=newline_pos).collect();
            let line = line.trim_end_matches(['\r', '\n']);

            if line.is_empty() {
                if !self.data_lines.is_empty() || self.current.event.is_some() {
                    self.current.data = self.data_lines.join("\n");
                    events.push(std::mem::take(&mut self.current));
                    self.data_lines.clear();
                }
                continue;
            }

            if let Some(stripped) = line.strip_prefix("event:") {
                self.current.event = Some(stripped.trim_start().to_string());
            } else if let Some(stripped) = line.strip_prefix("data:") {
                self.data_lines.push(stripped.trim_start().to_string());
            } else if let Some(stripped) = line.strip_prefix("id:") {
                self.current.id = Some(stripped.trim_start().to_string());
            }
            // lines starting with ':' are comments (often used as keepalive pings) — ignored.
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_single_complete_event() {
        let mut parser = SseLineParser::new();
        let events = parser.feed(b"event: bid_update:123\ndata: {\"currentBid\":50}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("bid_update:123"));
        assert_eq!(events[0].data, r#"{"currentBid":50}"#);
    }

    #[test]
    fn handles_split_chunks_across_feed_calls() {
        let mut parser = SseLineParser::new();
        assert!(parser.feed(b"event: bid_upd").is_empty());
        assert!(parser.feed(b"ate:123\ndata: {\"cu").is_empty());
        let events = parser.feed(b"rrentBid\":50}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("bid_update:123"));
    }

    #[test]
    fn joins_multi_line_data_fields() {
        let mut parser = SseLineParser::new();
        let events = parser.feed(b"event: ping\ndata: line one\ndata: line two\n\n");
        assert_eq!(events[0].data, "line one\nline two");
    }

    #[test]
    fn ignores_comment_lines() {
        let mut parser = SseLineParser::new();
        let events = parser.feed(b":keepalive\nevent: ping\ndata: {}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("ping"));
    }
}

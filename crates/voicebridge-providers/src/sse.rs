//! Incremental SSE (Server-Sent Events) parser.
//!
//! Network chunks do not align with event boundaries, so the parser keeps a
//! line buffer across chunks and emits events as blank lines arrive.

use futures::Stream;
use tokio_stream::StreamExt;

/// A parsed SSE event.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Stateful parser fed with raw body chunks.
#[derive(Default)]
pub struct SseParser {
    buffer: String,
    current_event: Option<String>,
    current_data: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning any events completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        let mut events = Vec::new();
        while let Some(newline_pos) = self.buffer.find('\n') {
            let line = self.buffer[..newline_pos].trim_end_matches('\r').to_string();
            self.buffer.drain(..=newline_pos);

            if line.is_empty() {
                if let Some(event) = self.dispatch() {
                    events.push(event);
                }
            } else if line.starts_with(':') {
                // comment
            } else if let Some(value) = line.strip_prefix("event:") {
                self.current_event = Some(value.trim_start().to_string());
            } else if let Some(value) = line.strip_prefix("data:") {
                self.current_data.push(value.trim_start().to_string());
            }
            // Unknown fields (id, retry, ...) are ignored.
        }
        events
    }

    /// Flush any event still pending when the stream ends.
    pub fn finish(&mut self) -> Option<SseEvent> {
        self.dispatch()
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.current_data.is_empty() {
            self.current_event = None;
            return None;
        }
        Some(SseEvent {
            event: self.current_event.take(),
            data: self.current_data.drain(..).collect::<Vec<_>>().join("\n"),
        })
    }
}

/// Parse a reqwest response body as a stream of SSE events.
pub fn parse_sse_stream(
    response: reqwest::Response,
) -> impl Stream<Item = anyhow::Result<SseEvent>> {
    struct State {
        byte_stream:
            std::pin::Pin<Box<dyn Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>>,
        parser: SseParser,
        pending: std::collections::VecDeque<SseEvent>,
        done: bool,
    }

    futures::stream::unfold(
        State {
            byte_stream: Box::pin(response.bytes_stream()),
            parser: SseParser::new(),
            pending: std::collections::VecDeque::new(),
            done: false,
        },
        |mut state| async move {
            loop {
                if let Some(event) = state.pending.pop_front() {
                    return Some((Ok(event), state));
                }
                if state.done {
                    return None;
                }
                match state.byte_stream.next().await {
                    Some(Ok(chunk)) => {
                        state.pending.extend(state.parser.push(&chunk));
                    }
                    Some(Err(e)) => {
                        return Some((Err(anyhow::anyhow!("SSE stream error: {e}")), state));
                    }
                    None => {
                        state.done = true;
                        if let Some(event) = state.parser.finish() {
                            state.pending.push_back(event);
                        }
                    }
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut parser = SseParser::new();
        let events = parser.push(b"data: {\"x\":1}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "{\"x\":1}");
        assert!(events[0].event.is_none());
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"data: hel").is_empty());
        assert!(parser.push(b"lo\n").is_empty());
        let events = parser.push(b"\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "hello");
    }

    #[test]
    fn test_multiline_data_and_event_name() {
        let mut parser = SseParser::new();
        let events = parser.push(b"event: delta\ndata: a\ndata: b\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("delta"));
        assert_eq!(events[0].data, "a\nb");
    }

    #[test]
    fn test_comments_and_crlf_ignored() {
        let mut parser = SseParser::new();
        let events = parser.push(b": keepalive\r\ndata: ok\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "ok");
    }

    #[test]
    fn test_finish_flushes_trailing_event() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"data: tail\n").is_empty());
        let event = parser.finish().unwrap();
        assert_eq!(event.data, "tail");
        assert!(parser.finish().is_none());
    }
}

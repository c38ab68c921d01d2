use super::logging::emit_sse_parse_error;
use crate::types::{ChatChunk, StreamEvent};

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// Splits a chat-completions byte stream into events.
///
/// Bytes are buffered until a newline arrives, so neither a `data: ` line nor
/// a multi-byte character split across reads is ever decoded half-way.
#[derive(Default)]
pub struct StreamParser {
    buffer: Vec<u8>,
    done: bool,
}

impl StreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        let mut start = 0;

        while let Some(offset) = self.buffer[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            let line = String::from_utf8_lossy(&self.buffer[start..end]).into_owned();
            self.parse_line(&line, &mut events);
            start = end + 1;
        }

        if start > 0 {
            self.buffer.drain(..start);
        }

        events
    }

    /// Parses whatever is left once the body has ended. A well-formed stream
    /// leaves nothing behind.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let rest = std::mem::take(&mut self.buffer);
        let mut events = Vec::new();
        if !rest.is_empty() {
            let line = String::from_utf8_lossy(&rest).into_owned();
            self.parse_line(&line, &mut events);
        }
        events
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    fn parse_line(&mut self, line: &str, events: &mut Vec<StreamEvent>) {
        let trimmed = line.trim();
        let Some(json_data) = trimmed.strip_prefix(DATA_PREFIX) else {
            return;
        };

        if json_data == DONE_SENTINEL {
            self.done = true;
            events.push(StreamEvent::Done);
            return;
        }

        match serde_json::from_str::<ChatChunk>(json_data) {
            Ok(chunk) => {
                if let Some(usage) = chunk.usage {
                    events.push(StreamEvent::Usage(usage));
                }
                let content = chunk
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.delta.content)
                    .filter(|text| !text.is_empty());
                if let Some(text) = content {
                    events.push(StreamEvent::Delta(text));
                }
            }
            Err(e) => emit_sse_parse_error(json_data, &e),
        }
    }
}

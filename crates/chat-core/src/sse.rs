//! Line codec for the chat-stream endpoint.
//!
//! Each event is one line `data: <json>` followed by a blank line. A line
//! `data: [DONE]` ends the stream early; bodies without it end when the
//! connection closes.

use chat_types::{Result, stream::StreamPayload};

pub const DATA_PREFIX: &str = "data: ";
pub const DONE_MARKER: &str = "[DONE]";

/// A decoded `data: ` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Payload(StreamPayload),
    Done,
}

/// Splits a byte stream into lines, carrying partial lines across reads.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buffer: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one body increment and return every line it completes, without
    /// the trailing `\n` / `\r\n`.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
            line.pop();
            if matches!(line.last(), Some(b'\r')) {
                line.pop();
            }
            lines.push(line);
        }
        lines
    }

    /// The unterminated remainder once the body has ended.
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        if self.buffer.is_empty() {
            return None;
        }
        let mut line = std::mem::take(&mut self.buffer);
        if matches!(line.last(), Some(b'\r')) {
            line.pop();
        }
        Some(line)
    }
}

/// Decode one line. Lines without the `data: ` prefix and lines whose
/// payload does not parse are dropped.
pub fn parse_line(line: &[u8]) -> Option<SseEvent> {
    let line = match std::str::from_utf8(line) {
        Ok(line) => line,
        Err(e) => {
            log::debug!("Dropping non-UTF-8 event line: {}", e);
            return None;
        }
    };
    let data = line.strip_prefix(DATA_PREFIX)?;
    if data.trim() == DONE_MARKER {
        return Some(SseEvent::Done);
    }
    match serde_json::from_str::<StreamPayload>(data) {
        Ok(payload) => Some(SseEvent::Payload(payload)),
        Err(e) => {
            log::debug!("Dropping malformed event line: {}", e);
            None
        }
    }
}

/// Encode one event line, blank-line terminated.
pub fn encode_payload(payload: &StreamPayload) -> Result<String> {
    Ok(format!("{}{}\n\n", DATA_PREFIX, serde_json::to_string(payload)?))
}

pub fn encode_done() -> String {
    format!("{}{}\n\n", DATA_PREFIX, DONE_MARKER)
}

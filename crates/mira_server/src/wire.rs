//! Server-Sent-Events framing of completion chunks.
//!
//! Each event is a single `data:` line followed by a blank line:
//!
//! ```text
//! data: {"id":"chatcmpl-...","object":"chat.completion.chunk",...}
//!
//! data: [DONE]
//!
//! ```

use bytes::Bytes;
use mira_core::StreamChunk;
use mira_error::{ServerError, ServerErrorKind};

/// Media type of the streaming response.
pub const EVENT_STREAM: &str = "text/event-stream";

/// Payload of the event that ends a gracefully completed stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One item of a streamed response, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A completion chunk
    Chunk(StreamChunk),
    /// End-of-stream sentinel
    Done,
}

impl StreamEvent {
    /// The chunk carried by this event, if any.
    pub fn chunk(&self) -> Option<&StreamChunk> {
        match self {
            Self::Chunk(chunk) => Some(chunk),
            Self::Done => None,
        }
    }

    /// Encode as one complete SSE frame.
    pub fn encode(&self) -> Result<Bytes, ServerError> {
        match self {
            Self::Chunk(chunk) => {
                let json = serde_json::to_string(chunk).map_err(|e| {
                    ServerError::new(ServerErrorKind::Serialization(format!(
                        "Failed to encode chunk: {}",
                        e
                    )))
                })?;
                Ok(data_frame(&json))
            }
            Self::Done => Ok(data_frame(DONE_SENTINEL)),
        }
    }
}

/// Frame `payload` as `data: <payload>\n\n`.
pub fn data_frame(payload: &str) -> Bytes {
    Bytes::from(format!("data: {}\n\n", payload))
}

/// Incremental parser for an SSE byte stream.
///
/// Bytes may arrive split at arbitrary points, including inside a UTF-8
/// sequence; complete events are returned as soon as their terminating blank
/// line has been seen. Only `data` fields are interpreted; comments and other
/// fields are skipped.
#[derive(Debug, Default)]
pub struct EventDecoder {
    buffer: Vec<u8>,
}

impl EventDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes and collect the data payloads of every completed event.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<String>, ServerError> {
        self.buffer.extend_from_slice(bytes);

        let mut payloads = Vec::new();
        while let Some(end) = find_event_end(&self.buffer) {
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            let text = std::str::from_utf8(&block[..end]).map_err(|e| {
                ServerError::new(ServerErrorKind::Stream(format!("Invalid UTF-8: {}", e)))
            })?;
            if let Some(payload) = data_payload(text) {
                payloads.push(payload);
            }
        }
        Ok(payloads)
    }

    /// Whether unterminated bytes are still buffered.
    pub fn has_partial(&self) -> bool {
        !self.buffer.is_empty()
    }
}

fn find_event_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

fn data_payload(block: &str) -> Option<String> {
    let lines: Vec<&str> = block
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.strip_prefix(' ').unwrap_or(value))
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

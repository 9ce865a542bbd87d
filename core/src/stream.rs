//! Decoder for the `data: {json}\n\n` records emitted by the streaming
//! generation endpoints.

use crate::slides::Slide;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Progress {
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        progress: Option<f32>,
        #[serde(default)]
        step: Option<u32>,
    },
    StepStart {
        #[serde(default)]
        step: Option<u32>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
    StepComplete {
        #[serde(default)]
        step: Option<u32>,
        #[serde(default)]
        message: Option<String>,
    },
    Slide {
        #[serde(default)]
        slide_number: Option<u32>,
        slide: Slide,
    },
    Complete {
        #[serde(default)]
        title: Option<String>,
        #[serde(default, deserialize_with = "crate::slides::lenient_slides")]
        slides: Vec<Slide>,
        #[serde(default)]
        message: Option<String>,
    },
    Error {
        #[serde(default = "StreamEvent::unknown_error", deserialize_with = "message_or_unknown")]
        message: String,
    },
    Done,
    #[serde(other)]
    Unknown,
}

impl StreamEvent {
    fn unknown_error() -> String {
        "Unknown error".to_string()
    }

    /// `complete`, `error` and `done` end a stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. } | Self::Done)
    }

    /// Human-readable progress line, if the event carries one.
    pub fn progress_message(&self) -> Option<&str> {
        match self {
            Self::Progress { message, .. }
            | Self::StepStart { message, .. }
            | Self::StepComplete { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

/// Buffers raw chunks and yields one event per complete record.
///
/// Buffering is byte-based so a multi-byte character split across two reads
/// is reassembled before decoding.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    skipped: usize,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some((end, delimiter)) = find_record_end(&self.buffer) {
            let record: Vec<u8> = self.buffer.drain(..end + delimiter).take(end).collect();
            if let Some(event) = self.decode_record(&record) {
                events.push(event);
            }
        }
        events
    }

    /// Decodes whatever is left once the body has ended.
    pub fn finish(&mut self) -> Option<StreamEvent> {
        let record = std::mem::take(&mut self.buffer);
        if record.iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        self.decode_record(&record)
    }

    /// Number of records dropped because they failed to decode.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }

    fn decode_record(&mut self, record: &[u8]) -> Option<StreamEvent> {
        let text = String::from_utf8_lossy(record);
        let mut payload = String::new();
        for line in text.lines() {
            let line = line.trim_end_matches('\r');
            if let Some(data) = line.strip_prefix("data:") {
                if !payload.is_empty() {
                    payload.push('\n');
                }
                payload.push_str(data.strip_prefix(' ').unwrap_or(data));
            }
        }
        if payload.trim().is_empty() {
            return None;
        }
        match serde_json::from_str::<StreamEvent>(&payload) {
            Ok(event) => Some(event),
            Err(err) => {
                self.skipped += 1;
                tracing::warn!(%err, record = %truncate(&payload, 200), "skipping malformed stream record");
                None
            }
        }
    }
}

fn message_or_unknown<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(StreamEvent::unknown_error))
}

/// Position of the first blank-line delimiter and its length.
fn find_record_end(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = find(buffer, b"\n\n").map(|at| (at, 2));
    let crlf = find(buffer, b"\r\n\r\n").map(|at| (at, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn truncate(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

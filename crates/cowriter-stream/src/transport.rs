//! Event-stream framing and frame decoding.
//!
//! [`FrameReader`] turns raw response bytes into `data:` payloads and
//! [`decode_frame`] turns each payload into a [`StreamEvent`].

use serde_json::Value;
use tracing::debug;

use crate::stream::StreamEvent;

/// Literal payload the backend sends to mark the end of a stream.
pub const DONE_SENTINEL: &str = "[DONE]";

const DEFAULT_ERROR_MESSAGE: &str = "Generation failed";

/// Incremental reader that splits a byte stream into `data:` frame payloads.
///
/// Lines may span chunk boundaries; bytes are buffered until a `\n` arrives so
/// multi-byte characters split across reads are reassembled intact.
#[derive(Debug, Default)]
pub struct FrameReader {
    buf: Vec<u8>,
    frames_emitted: u64,
}

impl FrameReader {
    /// Creates an empty reader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers `chunk` and returns the payloads of every complete `data:` line.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(idx) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=idx).collect();
            if let Some(payload) = parse_data_line(&line[..idx]) {
                frames.push(payload);
            }
        }
        self.frames_emitted += frames.len() as u64;
        frames
    }

    /// Number of buffered bytes not yet terminated by a newline.
    pub fn pending_bytes(&self) -> usize {
        self.buf.len()
    }

    /// Number of frames emitted so far.
    pub fn frames_emitted(&self) -> u64 {
        self.frames_emitted
    }

    /// Ends the read. An unterminated trailing line is dropped.
    pub fn finish(self) -> u64 {
        if !self.buf.is_empty() {
            debug!(
                pending_bytes = self.buf.len(),
                "discarding unterminated trailing line at end of stream"
            );
        }
        self.frames_emitted
    }
}

fn parse_data_line(line: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(line);
    let line = text.trim_end_matches('\r');
    let payload = line.strip_prefix("data:")?.trim();
    if payload.is_empty() {
        return None;
    }
    Some(payload.to_string())
}

/// Decodes one frame payload into a [`StreamEvent`]. Never fails.
///
/// Rules are applied in order:
/// 1. `[DONE]` is the end-of-stream sentinel.
/// 2. Text that is not JSON (or is a bare JSON string) is literal token content.
/// 3. `type` `error`, `start`, `complete`/`done` and `progress` map to their
///    event kinds. `type` `token` is a token only when it carries a string
///    `accumulated` field.
/// 4. Anything else, including legacy `{response: {...}}` and flat
///    `{title, description, criteria}` objects, is a terminal payload.
pub fn decode_frame(payload: &str) -> StreamEvent {
    let payload = payload.trim();
    if payload == DONE_SENTINEL {
        return StreamEvent::Complete;
    }

    let value: Value = match serde_json::from_str(payload) {
        Ok(Value::String(text)) => return literal_token(text),
        Ok(value) => value,
        Err(_) => return literal_token(payload.to_string()),
    };

    match value.get("type").and_then(Value::as_str) {
        Some("error") => {
            return StreamEvent::Error {
                message: error_message(&value),
            };
        }
        Some("start") => return StreamEvent::Start,
        Some("complete" | "done") => return StreamEvent::Complete,
        Some("progress") => {
            return StreamEvent::Progress {
                percent: progress_percent(&value),
            };
        }
        Some("token") => {
            if let Some(event) = token_event(&value) {
                return event;
            }
        }
        _ => {}
    }

    let shape = if has_legacy_response(&value) {
        "legacy_response"
    } else if has_flat_badge_fields(&value) {
        "flat"
    } else {
        "unrecognized"
    };
    debug!(shape, "decoded terminal payload frame");
    StreamEvent::FinalPayload { raw: value }
}

fn literal_token(text: String) -> StreamEvent {
    StreamEvent::Token {
        fragment: text.clone(),
        accumulated: text,
        done: false,
    }
}

fn error_message(value: &Value) -> String {
    let from_error = value.get("error").and_then(|err| {
        err.as_str()
            .or_else(|| err.get("message").and_then(Value::as_str))
    });
    from_error
        .or_else(|| value.get("message").and_then(Value::as_str))
        .filter(|msg| !msg.trim().is_empty())
        .unwrap_or(DEFAULT_ERROR_MESSAGE)
        .to_string()
}

fn progress_percent(value: &Value) -> f64 {
    match value.get("progress") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().trim_end_matches('%').parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn token_event(value: &Value) -> Option<StreamEvent> {
    let accumulated = value.get("accumulated").and_then(Value::as_str)?;
    let fragment = value
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let done = value.get("done").and_then(Value::as_bool).unwrap_or(false);
    Some(StreamEvent::Token {
        fragment: fragment.to_string(),
        accumulated: accumulated.to_string(),
        done,
    })
}

fn has_legacy_response(value: &Value) -> bool {
    value
        .get("response")
        .and_then(Value::as_object)
        .is_some_and(|response| {
            ["badge_name", "badge_description", "criteria"]
                .iter()
                .any(|key| response.contains_key(*key))
        })
}

fn has_flat_badge_fields(value: &Value) -> bool {
    value.as_object().is_some_and(|object| {
        ["title", "description", "criteria"]
            .iter()
            .any(|key| object.contains_key(*key))
    })
}

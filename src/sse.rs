//! Incremental decoding of the backend's streaming chat responses
//!
//! The backend frames its stream as SSE-style records:
//! - `data: <json>` - one event per line, type discriminated by a `type` field
//! - Empty line - record separator
//! - Lines starting with `:` or `event:` - framing noise (ignored)
//!
//! Chunks arrive at arbitrary byte boundaries, so the decoder buffers raw
//! bytes and only converts to text once a full line has been observed. A
//! `\n` is a single byte and can never land inside a multi-byte UTF-8
//! scalar, which makes the line boundary safe to split on.

use bytes::BytesMut;
use serde::Deserialize;
use tracing::{debug, warn};

/// Typed events decoded from one streaming exchange
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Running plain-text reply; carries the full text so far, not a delta
    TextChunk {
        accumulated_text: String,
        conversation_id: String,
    },
    /// Partial generated document
    ArtifactChunk { payload: String },
    /// Generated document in its final form
    ArtifactComplete { payload: String },
    /// Terminal event of a healthy stream
    Complete {
        final_text: String,
        conversation_id: String,
        is_artifact: bool,
        payload: Option<String>,
    },
    /// A data record that could not be decoded; skipped, never fatal
    MalformedLine { line: String },
}

/// Wire shape of the backend's stream records. Extra fields the server
/// sends (`content`, `is_complete`) are ignored by serde.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireRecord {
    TextChunk {
        accumulated_text: String,
        conversation_id: String,
    },
    HtmlChunk {
        html_content: String,
    },
    HtmlComplete {
        html_content: String,
    },
    Complete {
        final_text: String,
        conversation_id: String,
        is_ui: bool,
        #[serde(default)]
        html_content: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

/// Decode one complete line into an event, or None for framing noise
/// and unrecognized record types.
fn decode_line(line: &str) -> Option<StreamEvent> {
    if line.is_empty() {
        return None;
    }

    let Some(data) = line.strip_prefix("data:") else {
        // `event:` lines, `:` keep-alive comments, anything else
        debug!(line = %truncate_for_log(line), "skipping non-data line");
        return None;
    };

    let data = data.trim();
    if data.is_empty() {
        return None;
    }

    match serde_json::from_str::<WireRecord>(data) {
        Ok(WireRecord::TextChunk {
            accumulated_text,
            conversation_id,
        }) => Some(StreamEvent::TextChunk {
            accumulated_text,
            conversation_id,
        }),
        Ok(WireRecord::HtmlChunk { html_content }) => Some(StreamEvent::ArtifactChunk {
            payload: html_content,
        }),
        Ok(WireRecord::HtmlComplete { html_content }) => Some(StreamEvent::ArtifactComplete {
            payload: html_content,
        }),
        Ok(WireRecord::Complete {
            final_text,
            conversation_id,
            is_ui,
            html_content,
        }) => Some(StreamEvent::Complete {
            final_text,
            conversation_id,
            is_artifact: is_ui,
            payload: html_content,
        }),
        Ok(WireRecord::Unknown) => {
            debug!(line = %truncate_for_log(data), "ignoring unrecognized record type");
            None
        }
        Err(e) => {
            warn!(error = %e, line = %truncate_for_log(data), "malformed stream record");
            Some(StreamEvent::MalformedLine {
                line: line.to_string(),
            })
        }
    }
}

fn truncate_for_log(s: &str) -> &str {
    match s.char_indices().nth(120) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Stateful decoder turning raw response-body chunks into [`StreamEvent`]s.
/// One decoder serves exactly one exchange; it is not restartable.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    buf: BytesMut,
    finished: bool,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer another chunk of the response body. Chunks fed after the
    /// terminal record are discarded.
    pub fn feed(&mut self, chunk: &[u8]) {
        if self.finished {
            return;
        }
        self.buf.extend_from_slice(chunk);
    }

    /// Decode the next event, if a complete line is buffered.
    ///
    /// Returns None when more bytes are needed or the terminal record has
    /// already been seen. Separator lines and unrecognized record types
    /// are consumed without producing an event.
    pub fn next_event(&mut self) -> Option<StreamEvent> {
        while !self.finished {
            let newline = self.buf.iter().position(|&b| b == b'\n')?;
            let mut line = self.buf.split_to(newline + 1);
            line.truncate(line.len() - 1);
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }

            let text = String::from_utf8_lossy(&line);
            if let Some(event) = decode_line(&text) {
                if matches!(event, StreamEvent::Complete { .. }) {
                    self.finished = true;
                }
                return Some(event);
            }
        }
        None
    }

    /// Flush a trailing line the transport closed without terminating.
    /// Call once, after the byte source reports end-of-stream.
    pub fn finish(&mut self) -> Option<StreamEvent> {
        if self.finished || self.buf.is_empty() {
            return None;
        }
        let line = self.buf.split_to(self.buf.len());
        let text = String::from_utf8_lossy(&line);
        let event = decode_line(text.trim_end_matches('\r'));
        if matches!(event, Some(StreamEvent::Complete { .. })) {
            self.finished = true;
        }
        event
    }

    /// True once the terminal record has been decoded
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

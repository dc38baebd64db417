//! Stream protocol frames.
//!
//! The assistant service answers a streaming chat request with
//! newline-delimited text. Protocol lines look like
//!
//! ```text
//! data: {"type":"message","content":"Hel","conversation_id":"c-1"}
//! data: {"type":"message","content":"lo"}
//! data: {"type":"done"}
//! ```
//!
//! and the stream may also end with the `data: [DONE]` sentinel.
//! [`FrameDecoder`] turns arbitrarily fragmented text into [`Frame`] values.

mod decoder;

use serde::{Deserialize, Serialize};

pub use decoder::FrameDecoder;

/// Prefix marking a payload line.
pub const DATA_MARKER: &str = "data:";

/// Sentinel payload that ends a stream like a `done` record.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Message used when an error record carries no `error` field.
pub const DEFAULT_ERROR_MESSAGE: &str = "stream reported an error";

/// The decoded meaning of a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKind {
    /// An incremental piece of the assistant's reply.
    Message { content: String },
    /// The server aborted the reply.
    Error { message: String },
    /// The reply is complete.
    Done,
}

/// One discrete unit of the streaming protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    kind: FrameKind,
    raw: String,
    payload: Option<StreamChunk>,
}

impl Frame {
    pub(crate) fn new(kind: FrameKind, raw: impl Into<String>, payload: Option<StreamChunk>) -> Self {
        Self {
            kind,
            raw: raw.into(),
            payload,
        }
    }

    /// Returns the decoded frame kind.
    pub fn kind(&self) -> &FrameKind {
        &self.kind
    }

    /// Returns the source line this frame was decoded from.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Returns the structured record, absent for the `[DONE]` sentinel.
    pub fn payload(&self) -> Option<&StreamChunk> {
        self.payload.as_ref()
    }

    /// Returns the message content for `Message` frames.
    pub fn content(&self) -> Option<&str> {
        match &self.kind {
            FrameKind::Message { content } => Some(content),
            _ => None,
        }
    }

    /// Returns the conversation id carried by the record, if any.
    pub fn conversation_id(&self) -> Option<&str> {
        self.payload.as_ref()?.conversation_id.as_deref()
    }

    /// Returns the message id carried by the record, if any.
    pub fn message_id(&self) -> Option<&str> {
        self.payload.as_ref()?.message_id.as_deref()
    }

    /// Returns true for `Error` and `Done` frames.
    pub fn is_terminal(&self) -> bool {
        !matches!(self.kind, FrameKind::Message { .. })
    }
}

/// The JSON record carried on a `data:` line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Record discriminator: `message`, `error` or `done`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StreamChunk {
    fn of_kind(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            content: None,
            message_id: None,
            conversation_id: None,
            error: None,
        }
    }

    /// A `message` record.
    pub fn message(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::of_kind("message")
        }
    }

    /// An `error` record.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::of_kind("error")
        }
    }

    /// A `done` record.
    pub fn done() -> Self {
        Self::of_kind("done")
    }

    pub fn with_conversation_id(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }

    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }
}

/// Encode a record as one wire event (`data: {json}` plus a blank line).
pub fn encode_frame(chunk: &StreamChunk) -> serde_json::Result<String> {
    Ok(format!("{} {}\n\n", DATA_MARKER, serde_json::to_string(chunk)?))
}

/// Encode the `[DONE]` sentinel event.
pub fn encode_done_sentinel() -> String {
    format!("{} {}\n\n", DATA_MARKER, DONE_SENTINEL)
}

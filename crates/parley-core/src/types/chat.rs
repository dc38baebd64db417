//! Chat request and response records.

use serde::{Deserialize, Serialize};

use crate::error::{Error, InvalidInputError};

/// Maximum message length accepted by the chat endpoints.
pub const MAX_MESSAGE_CHARS: usize = 10_000;

/// A message sent to a bot, optionally continuing a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub bot_id: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub stream: bool,
}

impl ChatRequest {
    /// Create a request for a new conversation.
    pub fn new(bot_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            bot_id: bot_id.into(),
            message: message.into(),
            conversation_id: None,
            stream: false,
        }
    }

    /// Continue an existing conversation.
    pub fn in_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    /// Returns a copy flagged for the streaming endpoint.
    pub fn streaming(&self) -> Self {
        Self {
            stream: true,
            ..self.clone()
        }
    }

    /// Check the request against the limits the chat endpoints enforce.
    pub fn validate(&self) -> Result<(), Error> {
        if self.bot_id.trim().is_empty() {
            return Err(InvalidInputError::ChatRequest {
                reason: "bot_id must not be empty".to_string(),
            }
            .into());
        }

        let len = self.message.chars().count();
        if len == 0 {
            return Err(InvalidInputError::ChatRequest {
                reason: "message must not be empty".to_string(),
            }
            .into());
        }
        if len > MAX_MESSAGE_CHARS {
            return Err(InvalidInputError::ChatRequest {
                reason: format!("message exceeds {MAX_MESSAGE_CHARS} characters"),
            }
            .into());
        }

        Ok(())
    }
}

/// Reply from the non-streaming chat endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub message_id: String,
    pub conversation_id: String,
    pub content: String,
    pub role: String,
    pub created_at: String,
}

/// The authenticated user as reported by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
}

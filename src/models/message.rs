use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// A single transcript entry, in the shape the backend exchanges
/// (`timestamp` / `is_generated_ui` on the wire).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Opaque message ID (a UUID string for locally created messages)
    pub id: String,
    /// Role of the message sender
    pub role: MessageRole,
    /// Content of the message
    pub content: String,
    /// When the message was created
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
    /// Whether the content is a generated markup document rather than plain text
    #[serde(rename = "is_generated_ui", default)]
    pub is_artifact: bool,
}

impl Message {
    /// Create a user message with a fresh ID and the current timestamp
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: MessageRole::User,
            content: content.into(),
            created_at: Utc::now(),
            is_artifact: false,
        }
    }

    /// Create an assistant message with a fresh ID and the current timestamp
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: MessageRole::Assistant,
            content: content.into(),
            created_at: Utc::now(),
            is_artifact: false,
        }
    }

    /// Create the empty assistant message that stands in for a reply
    /// while its exchange is still streaming
    pub fn assistant_placeholder() -> Self {
        Self::assistant("")
    }

    /// Whether this message still has no content
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

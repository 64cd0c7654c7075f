use serde::{Deserialize, Serialize};

use super::message::Message;

/// Response body of the buffered chat endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    /// Final assistant text for the exchange
    pub response: String,
    /// Conversation this exchange belongs to (server-assigned on first send)
    pub conversation_id: String,
    /// Whether the reply produced a generated markup document
    pub is_ui: bool,
    /// The generated document, when is_ui is true
    #[serde(default)]
    pub html_content: Option<String>,
    /// Server-side transcript after this exchange
    #[serde(default)]
    pub history: Vec<Message>,
}

/// Response body of the conversation fetch endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationPayload {
    pub conversation_id: String,
    #[serde(default)]
    pub history: Vec<Message>,
}

/// Response body of the health endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub grounding_enabled: Option<bool>,
}

impl HealthStatus {
    /// Whether the backend reported itself healthy
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

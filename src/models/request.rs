use serde::{Deserialize, Serialize};

use super::message::Message;

/// Request body for both the streaming and buffered chat endpoints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    /// The user's message text
    pub message: String,
    /// Conversation ID - None asks the server to start a new conversation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Prior transcript, exclusive of the message being sent
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub history: Vec<Message>,
}

impl ChatRequest {
    /// Create a request that starts a new conversation
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            conversation_id: None,
            history: Vec::new(),
        }
    }

    /// Set the conversation to continue (builder pattern)
    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    /// Attach the prior transcript (builder pattern)
    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_request_omits_optional_fields() {
        let request = ChatRequest::new("hello");
        assert!(request.conversation_id.is_none());
        assert!(request.history.is_empty());

        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("conversation_id"));
        assert!(!json.contains("history"));
    }

    #[test]
    fn test_builder_chain() {
        let history = vec![Message::user("earlier"), Message::assistant("reply")];
        let request = ChatRequest::new("next question")
            .with_conversation("conv-1")
            .with_history(history.clone());

        assert_eq!(request.conversation_id.as_deref(), Some("conv-1"));
        assert_eq!(request.history, history);
    }

    #[test]
    fn test_request_serializes_history_messages() {
        let request =
            ChatRequest::new("follow-up").with_history(vec![Message::user("first question")]);

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"history\""));
        assert!(json.contains("first question"));
        assert!(json.contains("\"role\":\"user\""));
    }

    #[test]
    fn test_request_deserializes_without_history() {
        let json = r#"{"message":"hi","conversation_id":"c-9"}"#;
        let request: ChatRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.message, "hi");
        assert_eq!(request.conversation_id.as_deref(), Some("c-9"));
        assert!(request.history.is_empty());
    }
}

mod message;
mod request;
mod response;

pub use message::{Message, MessageRole};
pub use request::ChatRequest;
pub use response::{ChatResponse, ConversationPayload, HealthStatus};

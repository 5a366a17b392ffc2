pub mod chat;
pub mod secrets;

pub use chat::{ChatMessage, ChatRequest, StreamingMethod};
pub use secrets::{ConnectionSecrets, SessionConfig};

use serde::{Deserialize, Serialize};
use std::fmt;

/// One chat message in OpenAI wire form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A single-turn request built from the form on each submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub model: String,
    pub message: String,
    pub stream: bool,
}

impl ChatRequest {
    pub fn to_body(&self) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::user(self.message.clone())],
            stream: self.stream,
        }
    }
}

/// Body of `POST /chat/completions`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

/// Non-streaming completion.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletion {
    pub fn into_content(self) -> Option<String> {
        self.choices.into_iter().next()?.message.content
    }
}

/// One `data:` event of a streaming completion.
///
/// The gateway reports failures after the stream has started as an event
/// carrying `error` instead of `choices`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default)]
    pub error: Option<ChunkError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChunkError {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: Delta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionChunk {
    /// Text carried by the first choice, if any.
    pub fn into_fragment(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()?
            .delta
            .content
            .filter(|c| !c.is_empty())
    }
}

/// How the Day-3 page renders a completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamingMethod {
    #[default]
    Direct,
    #[serde(rename = "Real Streaming")]
    RealStreaming,
}

impl StreamingMethod {
    pub const ALL: [StreamingMethod; 2] = [StreamingMethod::Direct, StreamingMethod::RealStreaming];

    pub fn label(self) -> &'static str {
        match self {
            StreamingMethod::Direct => "Direct",
            StreamingMethod::RealStreaming => "Real Streaming",
        }
    }

    pub fn is_stream(self) -> bool {
        matches!(self, StreamingMethod::RealStreaming)
    }
}

impl fmt::Display for StreamingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

use eventsource_stream::Eventsource;
use futures::{Stream, TryStreamExt, future};
use std::pin::Pin;
use tracing::{debug, error};
use url::Url;

use crate::error::DemoError;
use crate::types::ConnectionSecrets;
use crate::types::chat::{ChatCompletion, ChatCompletionChunk, ChatRequest};

/// Sentinel the gateway sends as the last `data:` payload.
const STREAM_DONE: &str = "[DONE]";

/// Incremental completion text. Finite and consumed once.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, DemoError>> + Send>>;

pub enum ChatResponse {
    Complete(String),
    Stream(FragmentStream),
}

/// OpenAI-compatible client for the Cortex REST gateway.
#[derive(Clone)]
pub struct CortexClient {
    http: reqwest::Client,
    completions_url: Url,
    api_key: String,
}

impl CortexClient {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        api_key: impl Into<String>,
    ) -> Result<Self, DemoError> {
        let completions_url = Url::parse(&format!(
            "{}/chat/completions",
            base_url.trim_end_matches('/')
        ))?;
        Ok(Self {
            http,
            completions_url,
            api_key: api_key.into(),
        })
    }

    /// Gateway on the account host, authenticated with the secret's password.
    pub fn from_secrets(
        http: reqwest::Client,
        secrets: &ConnectionSecrets,
    ) -> Result<Self, DemoError> {
        let base_url = secrets.gateway_base_url()?;
        Self::new(http, &base_url, secrets.api_key()?)
    }

    pub fn completions_url(&self) -> &Url {
        &self.completions_url
    }

    pub async fn create(&self, request: &ChatRequest) -> Result<ChatResponse, DemoError> {
        if request.stream {
            self.stream(request).await.map(ChatResponse::Stream)
        } else {
            self.complete(request).await.map(ChatResponse::Complete)
        }
    }

    /// Block until the whole completion is available.
    pub async fn complete(&self, request: &ChatRequest) -> Result<String, DemoError> {
        let resp = self.post(request, false).await?;
        let completion: ChatCompletion = resp.json().await?;
        completion
            .into_content()
            .ok_or(DemoError::EmptyResult("completion had no message content"))
    }

    /// Open a streaming completion; resolves once response headers arrive.
    pub async fn stream(&self, request: &ChatRequest) -> Result<FragmentStream, DemoError> {
        let resp = self.post(request, true).await?;
        let fragments = resp
            .bytes_stream()
            .eventsource()
            .map_err(|e| DemoError::Stream(e.to_string()))
            .try_take_while(|event| future::ready(Ok(event.data.trim() != STREAM_DONE)))
            .try_filter_map(|event| future::ready(parse_fragment(&event.data)));
        Ok(Box::pin(fragments))
    }

    async fn post(&self, request: &ChatRequest, stream: bool) -> Result<reqwest::Response, DemoError> {
        let mut body = request.to_body();
        body.stream = stream;
        debug!(url = %self.completions_url, model = %body.model, stream, "posting chat completion");

        let resp = self
            .http
            .post(self.completions_url.clone())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            let err = DemoError::from_upstream(resp).await;
            error!(model = %body.model, "Cortex gateway rejected request: {}", err);
            return Err(err);
        }
        Ok(resp)
    }
}

/// Text carried by one `data:` payload; keep-alives and role-only deltas
/// carry none. An error event ends the stream with that error.
fn parse_fragment(data: &str) -> Result<Option<String>, DemoError> {
    if data.trim().is_empty() {
        return Ok(None);
    }
    let chunk: ChatCompletionChunk = serde_json::from_str(data)?;
    if let Some(err) = chunk.error {
        error!("Cortex gateway sent error event: {}", err.message);
        return Err(DemoError::Stream(format!("gateway error: {}", err.message)));
    }
    Ok(chunk.into_fragment())
}

use futures::TryStreamExt;
use tracing::{debug, info};

use crate::api::cortex_api::{ChatResponse, CortexClient, FragmentStream};
use crate::error::DemoError;
use crate::types::{ChatRequest, ConnectionSecrets, StreamingMethod};
use crate::ui::Surface;

/// Relays one prompt at a time to the Cortex gateway and renders the answer.
#[derive(Clone)]
pub struct PromptRelay {
    client: CortexClient,
}

impl PromptRelay {
    pub fn new(client: CortexClient) -> Self {
        Self { client }
    }

    pub fn from_secrets(
        http: reqwest::Client,
        secrets: &ConnectionSecrets,
    ) -> Result<Self, DemoError> {
        Ok(Self::new(CortexClient::from_secrets(http, secrets)?))
    }

    /// Send `prompt` as a single user turn and render the response on
    /// `surface`. Returns the full rendered text.
    ///
    /// The prompt is not validated and the model is not checked against
    /// any list; the gateway decides.
    pub async fn relay<S: Surface + ?Sized>(
        &self,
        surface: &mut S,
        model: &str,
        prompt: &str,
        method: StreamingMethod,
    ) -> Result<String, DemoError> {
        let request = ChatRequest {
            model: model.to_string(),
            message: prompt.to_string(),
            stream: method.is_stream(),
        };
        info!(model, method = %method, prompt_chars = prompt.chars().count(), "relaying prompt");

        surface.spinner_start(&format!("Generating response with `{model}`"));
        let response = self.client.create(&request).await;
        match response {
            Ok(ChatResponse::Complete(text)) => {
                surface.text(&text);
                surface.spinner_stop();
                Ok(text)
            }
            Ok(ChatResponse::Stream(fragments)) => {
                surface.spinner_stop();
                write_stream(surface, fragments).await
            }
            Err(e) => {
                surface.spinner_stop();
                Err(e)
            }
        }
    }
}

/// Render fragments as they arrive until the stream ends.
///
/// Stops early without error when the surface is closed. A transport error
/// ends the render; fragments already shown stay on screen.
pub async fn write_stream<S: Surface + ?Sized>(
    surface: &mut S,
    mut fragments: FragmentStream,
) -> Result<String, DemoError> {
    let mut full = String::new();
    surface.stream_start();
    let result = loop {
        match fragments.try_next().await {
            Ok(Some(fragment)) => {
                surface.stream_fragment(&fragment);
                full.push_str(&fragment);
                if surface.is_closed() {
                    debug!(chars = full.len(), "surface closed mid-stream");
                    break Ok(());
                }
            }
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        }
    };
    surface.stream_end();
    result.map(|()| full)
}

use axum::{
    Form,
    body::Body,
    extract::State,
    http::header::CONTENT_TYPE,
    response::{Html, IntoResponse, Response},
};
use futures::StreamExt;
use serde::Deserialize;
use std::convert::Infallible;
use tracing::error;

use crate::config::CortexConfig;
use crate::error::DemoError;
use crate::router::DemoState;
use crate::service::PromptRelay;
use crate::types::{ConnectionSecrets, StreamingMethod};
use crate::ui::{HtmlPage, HtmlStream, Surface, widgets};

pub const DAY3_TITLE: &str = "Day 3: Prompt Cortex";

/// Submitted form fields. Missing fields fall back to the page defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptForm {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub method: StreamingMethod,
}

/// Secrets are read and the client built on every render, so a broken
/// configuration fails the page before the form is shown.
fn build_relay(state: &DemoState) -> Result<PromptRelay, DemoError> {
    let secrets = ConnectionSecrets::load(&state.secrets_path)?;
    PromptRelay::from_secrets(state.http.clone(), &secrets)
}

pub async fn day3_page(State(state): State<DemoState>) -> Result<Html<String>, DemoError> {
    build_relay(&state)?;

    let model = default_model(&state.cortex);
    let mut page = HtmlPage::new(DAY3_TITLE);
    page.title(DAY3_TITLE);
    render_form(
        &mut page,
        &state.cortex,
        &model,
        &state.cortex.example_prompt,
        StreamingMethod::Direct,
    );
    Ok(Html(page.finish()))
}

/// Re-render the form with the submitted values, then stream the answer
/// below it.
pub async fn day3_generate(
    State(state): State<DemoState>,
    Form(form): Form<PromptForm>,
) -> Result<Response, DemoError> {
    let relay = build_relay(&state)?;
    let model = form
        .model
        .clone()
        .unwrap_or_else(|| default_model(&state.cortex));

    let (mut surface, body) = HtmlStream::channel(DAY3_TITLE);
    surface.title(DAY3_TITLE);
    render_form(&mut surface, &state.cortex, &model, &form.prompt, form.method);

    tokio::spawn(async move {
        if let Err(e) = relay
            .relay(&mut surface, &model, &form.prompt, form.method)
            .await
        {
            error!(model = %model, method = %form.method, error = %e, "prompt relay failed");
            surface.exception(&e);
        }
        drop(surface.finish());
    });

    let body = Body::from_stream(body.map(Ok::<_, Infallible>));
    Ok(([(CONTENT_TYPE, "text/html; charset=utf-8")], body).into_response())
}

fn default_model(cortex: &CortexConfig) -> String {
    cortex.model_list.first().cloned().unwrap_or_default()
}

fn render_form<S: Surface + ?Sized>(
    surface: &mut S,
    cortex: &CortexConfig,
    model: &str,
    prompt: &str,
    method: StreamingMethod,
) {
    let mut html = String::from("<form method=\"post\" action=\"/day3\">\n");
    html.push_str(&widgets::select_box(
        "model",
        "Select a model",
        &cortex.model_list,
        model,
    ));
    html.push_str(&widgets::text_area("prompt", "Enter prompt", prompt));
    html.push_str(&widgets::radio(
        "method",
        "Streaming Method:",
        "Choose how to stream the response",
        method,
    ));
    html.push_str(&widgets::button("Generate Response"));
    html.push_str("</form>\n");
    surface.raw(&html);
}

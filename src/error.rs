use axum::{
    http::StatusCode,
    response::{Html, IntoResponse},
};
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error as ThisError;

use crate::ui::widgets;

#[derive(Debug, ThisError)]
pub enum DemoError {
    #[error("Secrets file not found at {}", .0.display())]
    SecretsNotFound(PathBuf),

    #[error("Secrets error: {0}")]
    Secrets(#[from] Box<figment::Error>),

    #[error("Missing `{0}` in connection secrets")]
    MissingSecret(&'static str),

    #[error("Private key not found at {}", .0.display())]
    PrivateKeyNotFound(PathBuf),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ambient session misconfigured: {0}")]
    AmbientMisconfigured(String),

    #[error("No active session in the hosting environment")]
    NoActiveSession,

    #[error("Session construction failed: {0}")]
    SessionConstruction(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Upstream error with status {status}: {message}")]
    UpstreamStatus { status: u16, message: String },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Empty result: {0}")]
    EmptyResult(&'static str),
}

/// Coarse classification used for display and status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    SessionConstruction,
    Transport,
}

impl DemoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DemoError::SecretsNotFound(_)
            | DemoError::Secrets(_)
            | DemoError::MissingSecret(_)
            | DemoError::PrivateKeyNotFound(_)
            | DemoError::InvalidPrivateKey(_)
            | DemoError::Io(_)
            | DemoError::AmbientMisconfigured(_)
            | DemoError::NoActiveSession => ErrorKind::Configuration,
            DemoError::SessionConstruction(_) => ErrorKind::SessionConstruction,
            DemoError::UrlParse(_)
            | DemoError::Reqwest(_)
            | DemoError::Json(_)
            | DemoError::UpstreamStatus { .. }
            | DemoError::Stream(_)
            | DemoError::EmptyResult(_) => ErrorKind::Transport,
        }
    }

    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }

    /// Build an upstream error from a non-success response, pulling the
    /// human-readable message out of the JSON body when there is one.
    pub async fn from_upstream(resp: reqwest::Response) -> Self {
        let status = resp.status().as_u16();
        let body = match resp.text().await {
            Ok(body) => body,
            Err(e) => return DemoError::Reqwest(e),
        };
        DemoError::UpstreamStatus {
            status,
            message: UpstreamErrorBody::message_from(&body),
        }
    }
}

impl From<figment::Error> for DemoError {
    fn from(e: figment::Error) -> Self {
        DemoError::Secrets(Box::new(e))
    }
}

impl IntoResponse for DemoError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.kind() {
            ErrorKind::Configuration | ErrorKind::SessionConstruction => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ErrorKind::Transport => StatusCode::BAD_GATEWAY,
        };
        (status, Html(widgets::error_page(&self))).into_response()
    }
}

/// Error payloads returned by the SQL API and the Cortex gateway.
///
/// Snowflake answers with `{"message": ...}`, the OpenAI-compatible
/// gateway sometimes with `{"error": {"message": ...}}`.
#[derive(Deserialize, Debug)]
struct UpstreamErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<NestedError>,
}

#[derive(Deserialize, Debug)]
struct NestedError {
    message: String,
}

impl UpstreamErrorBody {
    fn message_from(body: &str) -> String {
        match serde_json::from_str::<UpstreamErrorBody>(body) {
            Ok(UpstreamErrorBody {
                message: Some(m), ..
            }) => m,
            Ok(UpstreamErrorBody { error: Some(e), .. }) => e.message,
            _ => body.trim().to_string(),
        }
    }
}

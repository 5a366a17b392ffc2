#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::post,
};
use cortex_demos::DemoError;
use cortex_demos::service::{AmbientSessions, SessionBuilder, WarehouseSession};
use cortex_demos::types::SessionConfig;
use cortex_demos::ui::Surface;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

pub const KNOWN_MODELS: [&str; 3] = ["claude-3-5-sonnet", "mistral-large", "llama3.1-8b"];
pub const PKCS8_PEM: &str = include_str!("../fixtures/rsa_key.p8");

/// Deterministic answer the mock gateway gives for a prompt.
pub fn canned_answer(model: &str, prompt: &str) -> String {
    format!("[{model}] You asked {:?}. Python is a programming language.", prompt)
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub authorization: Option<String>,
    pub token_type: Option<String>,
    pub body: Value,
}

#[derive(Clone, Default)]
pub struct Recorder {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl Recorder {
    fn record(&self, headers: &HeaderMap, body: &Value) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        self.requests.lock().unwrap().push(RecordedRequest {
            authorization: header("authorization"),
            token_type: header("x-snowflake-authorization-token-type"),
            body: body.clone(),
        });
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock server");
    let addr = listener.local_addr().expect("mock server addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock server failed");
    });
    addr
}

/// OpenAI-compatible gateway under `/api/v2/cortex/v1`.
///
/// Models outside [`KNOWN_MODELS`] get a 400. A prompt of `"break"` makes
/// the stream emit one good chunk followed by malformed JSON, and a prompt
/// of `"error"` one good chunk followed by an error event.
pub async fn spawn_gateway() -> (SocketAddr, Recorder) {
    let recorder = Recorder::default();
    let app = Router::new()
        .route("/api/v2/cortex/v1/chat/completions", post(chat_completions))
        .with_state(recorder.clone());
    (serve(app).await, recorder)
}

async fn chat_completions(
    State(recorder): State<Recorder>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    recorder.record(&headers, &body);

    let model = body["model"].as_str().unwrap_or_default().to_string();
    if !KNOWN_MODELS.contains(&model.as_str()) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": format!("unknown model '{model}'")})),
        )
            .into_response();
    }
    let prompt = body["messages"][0]["content"].as_str().unwrap_or_default();
    let answer = canned_answer(&model, prompt);

    if body["stream"].as_bool() != Some(true) {
        return Json(json!({
            "id": "chatcmpl-test",
            "object": "chat.completion",
            "model": model,
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": answer},
                "finish_reason": "stop"
            }]
        }))
        .into_response();
    }

    let mut sse = String::new();
    let role_chunk = json!({"choices": [{"index": 0, "delta": {"role": "assistant"}}]});
    sse.push_str(&format!("data: {role_chunk}\n\n"));
    for piece in answer.split_inclusive(' ') {
        let chunk = json!({"choices": [{"index": 0, "delta": {"content": piece}}]});
        sse.push_str(&format!("data: {chunk}\n\n"));
        if prompt == "break" {
            sse.push_str("data: {not json\n\n");
            break;
        }
        if prompt == "error" {
            let event = json!({"error": {"message": "quota exceeded", "code": 429}});
            sse.push_str(&format!("data: {event}\n\n"));
            break;
        }
    }
    sse.push_str("data: [DONE]\n\n");
    ([(CONTENT_TYPE, "text/event-stream")], sse).into_response()
}

/// How the mock SQL API answers every statement.
#[derive(Debug, Clone, Copy)]
pub enum SqlApiReply {
    Version(&'static str),
    /// 401 as for an invalid JWT.
    Reject,
    /// 200 with an empty result set.
    NoRows,
    /// 202 with the statement still executing.
    StillRunning,
}

pub async fn spawn_sql_api(reply: SqlApiReply) -> (SocketAddr, Recorder) {
    let recorder = Recorder::default();
    let app = Router::new()
        .route(
            "/api/v2/statements",
            post(move |State(recorder): State<Recorder>, headers: HeaderMap, Json(body): Json<Value>| async move {
                recorder.record(&headers, &body);
                match reply {
                    SqlApiReply::Version(version) => Json(json!({
                        "resultSetMetaData": {"numRows": 1},
                        "data": [[version]],
                        "code": "090001",
                        "statementHandle": "01b2-0000-test",
                        "message": "Statement executed successfully."
                    }))
                    .into_response(),
                    SqlApiReply::Reject => (
                        StatusCode::UNAUTHORIZED,
                        Json(json!({"code": "390144", "message": "JWT token is invalid."})),
                    )
                        .into_response(),
                    SqlApiReply::NoRows => Json(json!({
                        "resultSetMetaData": {"numRows": 0},
                        "data": [],
                        "code": "090001",
                        "statementHandle": "01b2-0000-empty",
                        "message": "Statement executed successfully."
                    }))
                    .into_response(),
                    SqlApiReply::StillRunning => (
                        StatusCode::ACCEPTED,
                        Json(json!({
                            "code": "333334",
                            "statementHandle": "01b2-0000-slow",
                            "message": "Asynchronous execution in progress."
                        })),
                    )
                        .into_response(),
                }
            }),
        )
        .with_state(recorder.clone());
    (serve(app).await, recorder)
}

/// Session answering every query with a fixed value.
pub struct FixedSession(pub &'static str);

#[async_trait]
impl WarehouseSession for FixedSession {
    async fn query_scalar(&self, _sql: &str) -> Result<Option<String>, DemoError> {
        Ok(Some(self.0.to_string()))
    }
}

pub enum FakeAmbient {
    Available(&'static str),
    Absent,
    Broken,
}

#[async_trait]
impl AmbientSessions for FakeAmbient {
    async fn active_session(&self) -> Result<Box<dyn WarehouseSession>, DemoError> {
        match self {
            FakeAmbient::Available(version) => Ok(Box::new(FixedSession(*version))),
            FakeAmbient::Absent => Err(DemoError::NoActiveSession),
            FakeAmbient::Broken => Err(DemoError::AmbientMisconfigured(
                "token unreadable".to_string(),
            )),
        }
    }
}

/// Builder that counts calls and keeps the last configuration it saw.
#[derive(Default)]
pub struct CountingBuilder {
    pub calls: AtomicUsize,
    pub last_config: Mutex<Option<SessionConfig>>,
    pub fail_with: Option<fn() -> DemoError>,
}

impl CountingBuilder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionBuilder for CountingBuilder {
    async fn create(&self, config: SessionConfig) -> Result<Box<dyn WarehouseSession>, DemoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_config.lock().unwrap() = Some(config);
        match self.fail_with {
            Some(make_err) => Err(make_err()),
            None => Ok(Box::new(FixedSession("9.1.0"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    Title(String),
    Success(String),
    Text(String),
    SpinnerStart(String),
    SpinnerStop,
    StreamStart,
    Fragment(String),
    StreamEnd,
    Exception(String),
}

/// Surface that records every primitive call in order.
#[derive(Default)]
pub struct RecordingSurface {
    pub events: Vec<Rendered>,
    /// Report closed after this many fragments.
    pub close_after: Option<usize>,
}

impl RecordingSurface {
    pub fn fragments(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Rendered::Fragment(f) => Some(f.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn text_blocks(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Rendered::Text(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Surface for RecordingSurface {
    fn title(&mut self, text: &str) {
        self.events.push(Rendered::Title(text.to_string()));
    }
    fn success(&mut self, text: &str) {
        self.events.push(Rendered::Success(text.to_string()));
    }
    fn text(&mut self, text: &str) {
        self.events.push(Rendered::Text(text.to_string()));
    }
    fn raw(&mut self, _html: &str) {}
    fn spinner_start(&mut self, label: &str) {
        self.events.push(Rendered::SpinnerStart(label.to_string()));
    }
    fn spinner_stop(&mut self) {
        self.events.push(Rendered::SpinnerStop);
    }
    fn stream_start(&mut self) {
        self.events.push(Rendered::StreamStart);
    }
    fn stream_fragment(&mut self, fragment: &str) {
        self.events.push(Rendered::Fragment(fragment.to_string()));
    }
    fn stream_end(&mut self) {
        self.events.push(Rendered::StreamEnd);
    }
    fn exception(&mut self, err: &DemoError) {
        self.events.push(Rendered::Exception(err.to_string()));
    }
    fn is_closed(&self) -> bool {
        self.close_after
            .is_some_and(|n| self.fragments().len() >= n)
    }
}

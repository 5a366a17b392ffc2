use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::api::keypair::KeyPairAuth;
use crate::error::DemoError;
use crate::service::session_acquirer::{SessionBuilder, WarehouseSession};
use crate::types::SessionConfig;

const TOKEN_TYPE_HEADER: &str = "X-Snowflake-Authorization-Token-Type";

/// Bearer credentials accepted by `/api/v2/statements`.
#[derive(Clone)]
pub enum SqlApiAuth {
    KeyPairJwt(String),
    OAuth(String),
}

impl SqlApiAuth {
    fn token(&self) -> &str {
        match self {
            SqlApiAuth::KeyPairJwt(t) | SqlApiAuth::OAuth(t) => t,
        }
    }

    fn token_type(&self) -> &'static str {
        match self {
            SqlApiAuth::KeyPairJwt(_) => "KEYPAIR_JWT",
            SqlApiAuth::OAuth(_) => "OAUTH",
        }
    }
}

/// Session defaults sent with every statement.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct StatementContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

#[derive(Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    timeout: u64,
    #[serde(flatten)]
    context: &'a StatementContext,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct StatementResponse {
    #[serde(default)]
    data: Vec<Vec<Option<String>>>,
    #[serde(default)]
    statement_handle: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Warehouse session backed by the Snowflake SQL API v2.
pub struct SqlApiSession {
    http: reqwest::Client,
    statements_url: Url,
    auth: SqlApiAuth,
    context: StatementContext,
    timeout_secs: u64,
}

impl SqlApiSession {
    pub fn new(
        http: reqwest::Client,
        host: &str,
        auth: SqlApiAuth,
        context: StatementContext,
        timeout_secs: u64,
    ) -> Result<Self, DemoError> {
        Ok(Self {
            http,
            statements_url: statements_url(host)?,
            auth,
            context,
            timeout_secs,
        })
    }
}

/// Accepts a bare host or a full `http(s)://` origin.
fn statements_url(host: &str) -> Result<Url, DemoError> {
    let host = host.trim_end_matches('/');
    let origin = if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    };
    Ok(Url::parse(&format!("{origin}/api/v2/statements"))?)
}

#[async_trait]
impl WarehouseSession for SqlApiSession {
    async fn query_scalar(&self, sql: &str) -> Result<Option<String>, DemoError> {
        debug!(url = %self.statements_url, sql, "submitting statement");
        let body = StatementRequest {
            statement: sql,
            timeout: self.timeout_secs,
            context: &self.context,
        };
        let resp = self
            .http
            .post(self.statements_url.clone())
            .bearer_auth(self.auth.token())
            .header(TOKEN_TYPE_HEADER, self.auth.token_type())
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;

        match resp.status() {
            StatusCode::OK => {}
            // Authentication happens on the first statement, so a rejected
            // token surfaces here rather than at construction time.
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let err = DemoError::from_upstream(resp).await;
                warn!("SQL API rejected credentials: {}", err);
                return Err(DemoError::SessionConstruction(err.to_string()));
            }
            StatusCode::ACCEPTED => {
                let parsed: StatementResponse = resp.json().await?;
                return Err(DemoError::UpstreamStatus {
                    status: StatusCode::ACCEPTED.as_u16(),
                    message: format!(
                        "statement {} still running",
                        parsed.statement_handle.as_deref().unwrap_or("<unknown>")
                    ),
                });
            }
            _ => return Err(DemoError::from_upstream(resp).await),
        }

        let parsed: StatementResponse = resp.json().await?;
        debug!(
            handle = parsed.statement_handle.as_deref().unwrap_or("<none>"),
            message = parsed.message.as_deref().unwrap_or(""),
            rows = parsed.data.len(),
            "statement finished"
        );
        parsed
            .data
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .ok_or(DemoError::EmptyResult("statement returned no rows"))
    }
}

/// Builds key-pair authenticated [`SqlApiSession`]s.
#[derive(Clone)]
pub struct SqlApiBuilder {
    http: reqwest::Client,
    statement_timeout_secs: u64,
}

impl SqlApiBuilder {
    pub fn new(http: reqwest::Client, statement_timeout_secs: u64) -> Self {
        Self {
            http,
            statement_timeout_secs,
        }
    }
}

#[async_trait]
impl SessionBuilder for SqlApiBuilder {
    async fn create(&self, config: SessionConfig) -> Result<Box<dyn WarehouseSession>, DemoError> {
        let auth = KeyPairAuth::from_config(&config)?;
        let token = auth.issue(Utc::now())?;
        let host = config.resolved_host()?;
        info!(host = %host, subject = auth.subject(), "creating key-pair session");

        let context = StatementContext {
            warehouse: config.warehouse,
            role: config.role,
            database: config.database,
            schema: config.schema,
        };
        let session = SqlApiSession::new(
            self.http.clone(),
            &host,
            SqlApiAuth::KeyPairJwt(token),
            context,
            self.statement_timeout_secs,
        )?;
        Ok(Box::new(session))
    }
}

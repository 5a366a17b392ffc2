use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

use crate::api::sql_api::{SqlApiAuth, SqlApiSession, StatementContext};
use crate::config::SNOWFLAKE_DOMAIN;
use crate::error::DemoError;
use crate::service::session_acquirer::{AmbientSessions, WarehouseSession};

/// Session injected by Snowpark Container Services.
///
/// The runtime mounts a short-lived OAuth token at `token_path` and
/// describes the account through `SNOWFLAKE_*` variables. No token file
/// means we are not running inside the service.
pub struct ContainerAmbient {
    http: reqwest::Client,
    token_path: PathBuf,
    host: Option<String>,
    account: Option<String>,
    context: StatementContext,
    statement_timeout_secs: u64,
}

impl ContainerAmbient {
    pub fn new(
        http: reqwest::Client,
        token_path: impl Into<PathBuf>,
        host: Option<String>,
        account: Option<String>,
        statement_timeout_secs: u64,
    ) -> Self {
        Self {
            http,
            token_path: token_path.into(),
            host,
            account,
            context: StatementContext::default(),
            statement_timeout_secs,
        }
    }

    /// Read host, account and session defaults from the container environment.
    pub fn from_env(
        http: reqwest::Client,
        token_path: impl Into<PathBuf>,
        statement_timeout_secs: u64,
    ) -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        let mut ambient = Self::new(
            http,
            token_path,
            var("SNOWFLAKE_HOST"),
            var("SNOWFLAKE_ACCOUNT"),
            statement_timeout_secs,
        );
        ambient.context = StatementContext {
            warehouse: var("SNOWFLAKE_WAREHOUSE"),
            role: None,
            database: var("SNOWFLAKE_DATABASE"),
            schema: var("SNOWFLAKE_SCHEMA"),
        };
        ambient
    }

    fn host(&self) -> Result<String, DemoError> {
        if let Some(host) = &self.host {
            return Ok(host.clone());
        }
        self.account
            .as_ref()
            .map(|account| format!("{account}.{SNOWFLAKE_DOMAIN}"))
            .ok_or_else(|| {
                DemoError::AmbientMisconfigured(
                    "session token present but neither SNOWFLAKE_HOST nor SNOWFLAKE_ACCOUNT is set"
                        .to_string(),
                )
            })
    }
}

#[async_trait]
impl AmbientSessions for ContainerAmbient {
    async fn active_session(&self) -> Result<Box<dyn WarehouseSession>, DemoError> {
        // The runtime rotates the token, so read it on every lookup.
        let token = match tokio::fs::read_to_string(&self.token_path).await {
            Ok(token) => token,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.token_path.display(), "no ambient session token");
                return Err(DemoError::NoActiveSession);
            }
            Err(e) => {
                return Err(DemoError::AmbientMisconfigured(format!(
                    "cannot read session token {}: {e}",
                    self.token_path.display()
                )));
            }
        };
        let token = token.trim();
        if token.is_empty() {
            return Err(DemoError::AmbientMisconfigured(format!(
                "session token {} is empty",
                self.token_path.display()
            )));
        }

        let session = SqlApiSession::new(
            self.http.clone(),
            &self.host()?,
            SqlApiAuth::OAuth(token.to_string()),
            self.context.clone(),
            self.statement_timeout_secs,
        )?;
        Ok(Box::new(session))
    }
}

use figment::{
    Figment,
    providers::{Format, Toml},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::{CORTEX_API_PATH, SNOWFLAKE_DOMAIN};
use crate::error::DemoError;

/// Table in the secrets file that holds the connection record.
pub const SECRETS_TABLE: &str = "connections.snowflake";

/// Connection record read from `[connections.snowflake]`.
///
/// Keys this crate does not interpret are kept in `extra` and travel
/// into [`SessionConfig`] untouched.
#[derive(Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ConnectionSecrets {
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    /// Password or programmatic access token; doubles as the gateway API key.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,
    #[serde(default)]
    pub warehouse: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ConnectionSecrets {
    /// Read the connection record from a secrets TOML file.
    pub fn load(path: &Path) -> Result<Self, DemoError> {
        if !path.is_file() {
            return Err(DemoError::SecretsNotFound(path.to_path_buf()));
        }
        Self::extract(Figment::from(Toml::file(path)))
    }

    /// Parse the connection record from TOML text.
    pub fn from_toml_str(toml: &str) -> Result<Self, DemoError> {
        Self::extract(Figment::from(Toml::string(toml)))
    }

    fn extract(figment: Figment) -> Result<Self, DemoError> {
        Ok(figment.extract_inner::<Self>(SECRETS_TABLE)?)
    }

    /// Host serving both the SQL API and the Cortex gateway.
    pub fn resolved_host(&self) -> Result<String, DemoError> {
        resolve_host(self.host.as_deref(), self.account.as_deref())
    }

    /// `https://<host>/api/v2/cortex/v1`. A host given with an explicit
    /// `http://` or `https://` scheme keeps it.
    pub fn gateway_base_url(&self) -> Result<String, DemoError> {
        let host = self.resolved_host()?;
        let host = host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            Ok(format!("{host}{CORTEX_API_PATH}"))
        } else {
            Ok(format!("https://{host}{CORTEX_API_PATH}"))
        }
    }

    pub fn api_key(&self) -> Result<&str, DemoError> {
        non_empty(self.password.as_deref()).ok_or(DemoError::MissingSecret("password"))
    }

    pub fn private_key_path(&self) -> Result<&Path, DemoError> {
        self.private_key_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(DemoError::MissingSecret("private_key_path"))
    }

    /// Swap the key path for the key itself.
    pub fn into_session_config(self, private_key: Vec<u8>) -> SessionConfig {
        SessionConfig {
            account: self.account,
            host: self.host,
            user: self.user,
            password: self.password,
            private_key,
            warehouse: self.warehouse,
            role: self.role,
            database: self.database,
            schema: self.schema,
            extra: self.extra,
        }
    }
}

impl fmt::Debug for ConnectionSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSecrets")
            .field("account", &self.account)
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("private_key_path", &self.private_key_path)
            .field("warehouse", &self.warehouse)
            .field("role", &self.role)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("extra", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Configuration handed to a [`SessionBuilder`](crate::service::session_acquirer::SessionBuilder).
///
/// Carries the raw key bytes and has no key path, so a builder never sees
/// two competing key sources.
#[derive(Clone, PartialEq)]
pub struct SessionConfig {
    pub account: Option<String>,
    pub host: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub private_key: Vec<u8>,
    pub warehouse: Option<String>,
    pub role: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub extra: BTreeMap<String, Value>,
}

impl SessionConfig {
    pub fn resolved_host(&self) -> Result<String, DemoError> {
        resolve_host(self.host.as_deref(), self.account.as_deref())
    }

    pub fn account(&self) -> Result<&str, DemoError> {
        non_empty(self.account.as_deref()).ok_or(DemoError::MissingSecret("account"))
    }

    pub fn user(&self) -> Result<&str, DemoError> {
        non_empty(self.user.as_deref()).ok_or(DemoError::MissingSecret("user"))
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("account", &self.account)
            .field("host", &self.host)
            .field("user", &self.user)
            .field("private_key", &format_args!("<{} bytes>", self.private_key.len()))
            .field("warehouse", &self.warehouse)
            .field("role", &self.role)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn resolve_host(host: Option<&str>, account: Option<&str>) -> Result<String, DemoError> {
    if let Some(host) = non_empty(host) {
        return Ok(host.to_string());
    }
    non_empty(account)
        .map(|account| format!("{account}.{SNOWFLAKE_DOMAIN}"))
        .ok_or(DemoError::MissingSecret("account"))
}

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::VERSION_PROBE;
use crate::error::DemoError;
use crate::types::{ConnectionSecrets, SessionConfig};

/// A live handle to the warehouse.
#[async_trait]
pub trait WarehouseSession: Send + Sync {
    /// Run `sql` and return the first column of the first row.
    /// `Ok(None)` is a SQL `NULL`.
    async fn query_scalar(&self, sql: &str) -> Result<Option<String>, DemoError>;
}

/// Session supplied by the hosting runtime, when there is one.
#[async_trait]
pub trait AmbientSessions: Send + Sync {
    /// Fails with [`DemoError::NoActiveSession`] outside a hosted runtime.
    async fn active_session(&self) -> Result<Box<dyn WarehouseSession>, DemoError>;
}

/// Turns a session configuration into a live session.
#[async_trait]
pub trait SessionBuilder: Send + Sync {
    async fn create(&self, config: SessionConfig) -> Result<Box<dyn WarehouseSession>, DemoError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSource {
    Ambient,
    Explicit,
}

pub struct AcquiredSession {
    pub session: Box<dyn WarehouseSession>,
    pub source: SessionSource,
}

/// Resolves a session: ambient first, then key-pair from local secrets.
#[derive(Clone)]
pub struct SessionAcquirer {
    ambient: Arc<dyn AmbientSessions>,
    builder: Arc<dyn SessionBuilder>,
    secrets_path: PathBuf,
}

impl SessionAcquirer {
    pub fn new(
        ambient: Arc<dyn AmbientSessions>,
        builder: Arc<dyn SessionBuilder>,
        secrets_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            ambient,
            builder,
            secrets_path: secrets_path.into(),
        }
    }

    pub async fn acquire(&self) -> Result<AcquiredSession, DemoError> {
        match self.ambient.active_session().await {
            Ok(session) => {
                info!("using ambient session from hosting environment");
                return Ok(AcquiredSession {
                    session,
                    source: SessionSource::Ambient,
                });
            }
            Err(DemoError::NoActiveSession) => {
                debug!("no ambient session; building one from local secrets");
            }
            Err(e) => {
                warn!(error = %e, "ambient session lookup failed");
                return Err(e);
            }
        }

        let secrets = ConnectionSecrets::load(&self.secrets_path)?;
        let session = self.create_explicit(secrets).await?;
        Ok(AcquiredSession {
            session,
            source: SessionSource::Explicit,
        })
    }

    /// Read the private key named by the secrets and build a session from it.
    /// A missing key file fails before the builder is ever called.
    pub async fn create_explicit(
        &self,
        secrets: ConnectionSecrets,
    ) -> Result<Box<dyn WarehouseSession>, DemoError> {
        let pk_path = secrets.private_key_path()?.to_path_buf();
        let private_key = match tokio::fs::read(&pk_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(DemoError::PrivateKeyNotFound(pk_path));
            }
            Err(e) => return Err(e.into()),
        };
        debug!(path = %pk_path.display(), bytes = private_key.len(), "read private key");

        let config = secrets.into_session_config(private_key);
        self.builder.create(config).await.map_err(|e| {
            if e.is_configuration() {
                e
            } else {
                DemoError::SessionConstruction(e.to_string())
            }
        })
    }

    /// Acquire a session and return the warehouse version.
    pub async fn probe_version(&self) -> Result<(String, SessionSource), DemoError> {
        let acquired = self.acquire().await?;
        let version = query_version(acquired.session.as_ref()).await?;
        info!(version = %version, source = ?acquired.source, "warehouse probe succeeded");
        Ok((version, acquired.source))
    }
}

pub async fn query_version(session: &dyn WarehouseSession) -> Result<String, DemoError> {
    Ok(session
        .query_scalar(VERSION_PROBE)
        .await?
        .unwrap_or_else(|| "NULL".to_string()))
}

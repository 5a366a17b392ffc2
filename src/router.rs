use axum::{Router, routing::get};
use std::path::PathBuf;
use std::sync::Arc;

use crate::api::sql_api::SqlApiBuilder;
use crate::config::{Config, CortexConfig};
use crate::error::DemoError;
use crate::handlers::{day1, day3, health_handler, index_handler};
use crate::service::{AmbientSessions, ContainerAmbient, SessionAcquirer, SessionBuilder};

/// Shared, read-only state. Sessions and clients are built per request.
#[derive(Clone)]
pub struct DemoState {
    pub http: reqwest::Client,
    pub secrets_path: PathBuf,
    pub acquirer: SessionAcquirer,
    pub cortex: Arc<CortexConfig>,
}

impl DemoState {
    pub fn new(
        http: reqwest::Client,
        secrets_path: impl Into<PathBuf>,
        ambient: Arc<dyn AmbientSessions>,
        builder: Arc<dyn SessionBuilder>,
        cortex: CortexConfig,
    ) -> Self {
        let secrets_path = secrets_path.into();
        Self {
            acquirer: SessionAcquirer::new(ambient, builder, secrets_path.clone()),
            http,
            secrets_path,
            cortex: Arc::new(cortex),
        }
    }

    /// Wire the production collaborators: container ambient sessions and
    /// key-pair SQL API sessions.
    pub fn from_config(cfg: &Config) -> Result<Self, DemoError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("cortex-demos/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let timeout = cfg.warehouse.statement_timeout_secs;
        let ambient = ContainerAmbient::from_env(http.clone(), &cfg.ambient.token_path, timeout);
        let builder = SqlApiBuilder::new(http.clone(), timeout);
        Ok(Self::new(
            http,
            &cfg.basic.secrets_path,
            Arc::new(ambient),
            Arc::new(builder),
            cfg.cortex.clone(),
        ))
    }
}

pub fn demo_router(state: DemoState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/healthz", get(health_handler))
        .route("/day1", get(day1::day1_handler))
        .route("/day3", get(day3::day3_page).post(day3::day3_generate))
        .with_state(state)
}

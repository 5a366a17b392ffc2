pub mod api;
pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod service;
pub mod types;
pub mod ui;

pub use error::DemoError;
pub use service::{PromptRelay, SessionAcquirer};

use axum::{extract::State, response::Html};

use crate::error::DemoError;
use crate::router::DemoState;
use crate::ui::{HtmlPage, Surface};

pub const DAY1_TITLE: &str = "Day 1: Connect to Snowflake";

/// Acquire a session, probe the version and report it.
pub async fn day1_handler(State(state): State<DemoState>) -> Result<Html<String>, DemoError> {
    let (version, _source) = state.acquirer.probe_version().await?;

    let mut page = HtmlPage::new(DAY1_TITLE);
    page.title(DAY1_TITLE);
    page.success(&format!(
        "Successfully connected! Snowflake Version: {version}"
    ));
    Ok(Html(page.finish()))
}

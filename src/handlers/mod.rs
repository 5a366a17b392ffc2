pub mod day1;
pub mod day3;

use axum::response::Html;

use crate::ui::{HtmlPage, Surface, widgets};

pub async fn index_handler() -> Html<String> {
    let mut page = HtmlPage::new("Cortex demos");
    page.title("Cortex demos");
    page.raw(&widgets::index(day1::DAY1_TITLE, day3::DAY3_TITLE));
    Html(page.finish())
}

pub async fn health_handler() -> &'static str {
    "ok"
}

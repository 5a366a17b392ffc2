//! HTML fragments for the demo pages.
//!
//! Fragments are rendered from the templates in `templates/`. Their names
//! end in `.html`, so minijinja escapes every value; callers pass plain text.

use minijinja::{Environment, HtmlEscape, Value, context};
use std::sync::LazyLock;
use tracing::error;

use crate::error::{DemoError, ErrorKind};
use crate::types::StreamingMethod;

const TEMPLATE_SOURCES: [(&str, &str); 11] = [
    ("page_head.html", include_str!("templates/page_head.html")),
    ("index.html", include_str!("templates/index.html")),
    ("title.html", include_str!("templates/title.html")),
    ("banner.html", include_str!("templates/banner.html")),
    ("text.html", include_str!("templates/text.html")),
    ("exception.html", include_str!("templates/exception.html")),
    ("spinner.html", include_str!("templates/spinner.html")),
    ("select_box.html", include_str!("templates/select_box.html")),
    ("text_area.html", include_str!("templates/text_area.html")),
    ("radio.html", include_str!("templates/radio.html")),
    ("button.html", include_str!("templates/button.html")),
];

static TEMPLATES: LazyLock<Environment<'static>> = LazyLock::new(|| {
    let mut env = Environment::new();
    env.set_keep_trailing_newline(true);
    for (name, source) in TEMPLATE_SOURCES {
        if let Err(e) = env.add_template(name, source) {
            error!(template = name, error = %e, "failed to load template");
        }
    }
    env
});

fn render(name: &str, ctx: Value) -> String {
    TEMPLATES
        .get_template(name)
        .and_then(|template| template.render(ctx))
        .unwrap_or_else(|e| {
            error!(template = name, error = %e, "failed to render template");
            String::new()
        })
}

/// Escape text written outside a template, such as stream fragments.
pub fn escape(text: &str) -> String {
    HtmlEscape(text).to_string()
}

/// Opening markup up to and including `<body>`.
pub fn page_head(title: &str) -> String {
    render("page_head.html", context! { title })
}

pub fn page_tail() -> &'static str {
    "</body>\n</html>\n"
}

/// Links to both demo pages.
pub fn index(day1: &str, day3: &str) -> String {
    render("index.html", context! { day1, day3 })
}

pub fn title(text: &str) -> String {
    render("title.html", context! { text })
}

pub fn success(text: &str) -> String {
    render("banner.html", context! { kind => "success", text })
}

pub fn error(text: &str) -> String {
    render("banner.html", context! { kind => "error", text })
}

/// Plain text block with whitespace preserved. Markdown syntax is shown
/// as written, not rendered.
pub fn text(text: &str) -> String {
    render("text.html", context! { text })
}

pub fn exception(err: &DemoError) -> String {
    render(
        "exception.html",
        context! { kind => kind_label(err.kind()), message => err.to_string() },
    )
}

pub fn spinner_start(id: usize, label: &str) -> String {
    render("spinner.html", context! { id, label })
}

/// Hides an already-flushed spinner.
pub fn spinner_stop(id: usize) -> String {
    format!("<style>#spinner-{id}{{display:none}}</style>\n")
}

pub fn stream_start() -> &'static str {
    "<div class=\"text stream\">"
}

pub fn stream_end() -> &'static str {
    "</div>\n"
}

/// Full document shown when a page fails before rendering anything.
pub fn error_page(err: &DemoError) -> String {
    let mut html = page_head("Error");
    if err.is_configuration() {
        html.push_str(&error(&err.to_string()));
    } else {
        html.push_str(&exception(err));
    }
    html.push_str(page_tail());
    html
}

fn kind_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Configuration => "ConfigurationError",
        ErrorKind::SessionConstruction => "SessionConstructionError",
        ErrorKind::Transport => "TransportError",
    }
}

pub fn select_box(name: &str, label: &str, options: &[String], selected: &str) -> String {
    render(
        "select_box.html",
        context! { name, label, options, selected },
    )
}

pub fn text_area(name: &str, label: &str, value: &str) -> String {
    render("text_area.html", context! { name, label, value })
}

pub fn radio(name: &str, label: &str, help: &str, selected: StreamingMethod) -> String {
    let options: Vec<&str> = StreamingMethod::ALL.iter().map(|m| m.label()).collect();
    render(
        "radio.html",
        context! { name, label, help, options, selected => selected.label() },
    )
}

pub fn button(text: &str) -> String {
    render("button.html", context! { text })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_template_loads() {
        for (name, _) in TEMPLATE_SOURCES {
            assert!(TEMPLATES.get_template(name).is_ok(), "{name} failed to load");
        }
    }

    #[test]
    fn escape_neutralises_markup() {
        let escaped = escape(r#"<script>alert("x" & 'y')</script>"#);
        assert!(!escaped.contains('<'));
        assert!(escaped.contains("&lt;script&gt;"));
        assert!(escaped.contains("&quot;x&quot; &amp; "));
    }

    #[test]
    fn template_values_are_escaped() {
        let html = title("Tell me <more>");
        assert_eq!(html, "<h1>Tell me &lt;more&gt;</h1>\n");
        assert_eq!(text("a < b"), "<div class=\"text\">a &lt; b</div>\n");
    }

    #[test]
    fn page_head_opens_body() {
        let html = page_head("Day 1");
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Day 1</title>"));
        assert!(html.trim_end().ends_with("<body>"));
    }

    #[test]
    fn select_marks_chosen_option() {
        let options = vec!["claude-3-5-sonnet".to_string(), "mistral-large".to_string()];
        let html = select_box("model", "Select a model", &options, "mistral-large");
        assert!(html.contains("<option value=\"mistral-large\" selected>mistral-large</option>"));
        assert!(html.contains("<option value=\"claude-3-5-sonnet\">"));
        assert!(html.trim_end().ends_with("</select>"));
    }

    #[test]
    fn radio_lists_both_methods() {
        let html = radio("method", "Streaming Method:", "help", StreamingMethod::RealStreaming);
        assert!(html.contains("value=\"Direct\">"));
        assert!(html.contains("value=\"Real Streaming\" checked>"));
    }

    #[test]
    fn spinner_carries_its_id() {
        assert_eq!(
            spinner_start(3, "Generating response with `mistral-large`"),
            "<div class=\"spinner\" id=\"spinner-3\">Generating response with `mistral-large`</div>\n"
        );
    }

    #[test]
    fn configuration_errors_render_as_banner() {
        let html = error_page(&DemoError::MissingSecret("password"));
        assert!(html.contains("banner error"));
        assert!(html.contains("Missing `password` in connection secrets"));

        let html = error_page(&DemoError::Stream("connection reset".into()));
        assert!(html.contains("<strong>TransportError</strong>"));
    }
}

use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::widgets;
use crate::error::DemoError;

/// Rendering primitives the pages draw with.
pub trait Surface: Send {
    fn title(&mut self, text: &str);
    fn success(&mut self, text: &str);
    /// Plain text block, shown whole.
    fn text(&mut self, text: &str);
    /// Pre-rendered markup such as a form.
    fn raw(&mut self, html: &str);
    fn spinner_start(&mut self, label: &str);
    fn spinner_stop(&mut self);
    fn stream_start(&mut self);
    fn stream_fragment(&mut self, fragment: &str);
    fn stream_end(&mut self);
    /// Default display for an error that aborted the render.
    fn exception(&mut self, err: &DemoError);

    /// True once nobody is reading the output any more.
    fn is_closed(&self) -> bool {
        false
    }
}

/// Destination for rendered markup.
pub trait HtmlSink: Send {
    fn emit(&mut self, html: &str);

    fn is_closed(&self) -> bool {
        false
    }
}

impl HtmlSink for String {
    fn emit(&mut self, html: &str) {
        self.push_str(html);
    }
}

/// Forwards markup to a streaming response body.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<String>,
    closed: bool,
}

impl HtmlSink for ChannelSink {
    fn emit(&mut self, html: &str) {
        if self.closed {
            return;
        }
        if self.tx.send(html.to_string()).is_err() {
            self.closed = true;
        }
    }

    fn is_closed(&self) -> bool {
        self.closed || self.tx.is_closed()
    }
}

pub struct HtmlSurface<S: HtmlSink> {
    sink: S,
    spinners: usize,
    open_spinner: Option<usize>,
}

/// Buffered page, sent once complete.
pub type HtmlPage = HtmlSurface<String>;

/// Page flushed to the client as it renders.
pub type HtmlStream = HtmlSurface<ChannelSink>;

impl<S: HtmlSink> HtmlSurface<S> {
    pub fn with_sink(mut sink: S, title: &str) -> Self {
        sink.emit(&widgets::page_head(title));
        Self {
            sink,
            spinners: 0,
            open_spinner: None,
        }
    }

    /// Close any spinner and the document, returning the sink.
    pub fn finish(mut self) -> S {
        self.spinner_stop();
        self.sink.emit(widgets::page_tail());
        self.sink
    }
}

impl HtmlPage {
    pub fn new(title: &str) -> Self {
        Self::with_sink(String::new(), title)
    }
}

impl HtmlStream {
    pub fn channel(title: &str) -> (Self, UnboundedReceiverStream<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = ChannelSink { tx, closed: false };
        (Self::with_sink(sink, title), UnboundedReceiverStream::new(rx))
    }
}

impl<S: HtmlSink> Surface for HtmlSurface<S> {
    fn title(&mut self, text: &str) {
        self.sink.emit(&widgets::title(text));
    }

    fn success(&mut self, text: &str) {
        self.sink.emit(&widgets::success(text));
    }

    fn text(&mut self, text: &str) {
        self.sink.emit(&widgets::text(text));
    }

    fn raw(&mut self, html: &str) {
        self.sink.emit(html);
    }

    fn spinner_start(&mut self, label: &str) {
        self.spinner_stop();
        self.spinners += 1;
        self.open_spinner = Some(self.spinners);
        self.sink.emit(&widgets::spinner_start(self.spinners, label));
    }

    fn spinner_stop(&mut self) {
        if let Some(id) = self.open_spinner.take() {
            self.sink.emit(&widgets::spinner_stop(id));
        }
    }

    fn stream_start(&mut self) {
        self.sink.emit(widgets::stream_start());
    }

    fn stream_fragment(&mut self, fragment: &str) {
        self.sink.emit(&widgets::escape(fragment));
    }

    fn stream_end(&mut self) {
        self.sink.emit(widgets::stream_end());
    }

    fn exception(&mut self, err: &DemoError) {
        self.spinner_stop();
        self.sink.emit(&widgets::exception(err));
    }

    fn is_closed(&self) -> bool {
        self.sink.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn page_wraps_content_in_document() {
        let mut page = HtmlPage::new("Day 1");
        page.title("Day 1: Connect to Snowflake");
        page.success("Successfully connected! Snowflake Version: 9.1.0");
        let html = page.finish();

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<h1>Day 1: Connect to Snowflake</h1>"));
        assert!(html.contains("Snowflake Version: 9.1.0"));
        assert!(html.trim_end().ends_with("</html>"));
    }

    #[test]
    fn spinner_is_hidden_on_stop_and_on_finish() {
        let mut page = HtmlPage::new("t");
        page.spinner_start("Generating response with `mistral-large`");
        page.spinner_stop();
        page.spinner_start("again");
        let html = page.finish();

        assert!(html.contains("id=\"spinner-1\""));
        assert!(html.contains("#spinner-1{display:none}"));
        assert!(html.contains("#spinner-2{display:none}"));
    }

    #[tokio::test]
    async fn stream_flushes_each_write() {
        let (mut surface, rx) = HtmlStream::channel("Day 3");
        surface.stream_start();
        surface.stream_fragment("Hello");
        surface.stream_fragment(" <world>");
        surface.stream_end();
        drop(surface.finish());

        let chunks: Vec<String> = rx.collect().await;
        assert!(chunks[0].starts_with("<!DOCTYPE html>"));
        assert!(chunks.contains(&"Hello".to_string()));
        assert!(chunks.contains(&" &lt;world&gt;".to_string()));
    }

    #[test]
    fn dropped_receiver_closes_stream() {
        let (mut surface, rx) = HtmlStream::channel("Day 3");
        assert!(!surface.is_closed());
        drop(rx);
        surface.stream_fragment("lost");
        assert!(surface.is_closed());
    }
}

pub mod surface;
pub mod widgets;

pub use surface::{HtmlPage, HtmlStream, HtmlSurface, Surface};

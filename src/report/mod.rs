//! Report assembly and rendering.

pub mod assembler;
pub mod renderer;

pub use assembler::{
    assemble, format_change, format_currency, report_path, DEFAULT_TITLE, NOT_APPLICABLE,
};
pub use renderer::{DocumentRenderer, HtmlRenderer, JsonRenderer, MarkdownRenderer};

use serde::{Deserialize, Serialize};

/// Output format for the rendered report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// HTML document (default)
    #[default]
    Html,
    /// Markdown document
    Markdown,
    /// JSON document
    Json,
}

impl OutputFormat {
    /// Renderer producing this format.
    pub fn renderer(self) -> Box<dyn DocumentRenderer> {
        match self {
            OutputFormat::Html => Box::new(HtmlRenderer),
            OutputFormat::Markdown => Box::new(MarkdownRenderer),
            OutputFormat::Json => Box::new(JsonRenderer),
        }
    }
}

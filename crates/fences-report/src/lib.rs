pub mod csv_sink;
pub mod json;
pub mod markdown;
pub mod text;

pub use csv_sink::CsvSink;

use std::fmt;

/// Rendering of a batch summary on stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err(anyhow::anyhow!(
                "unknown format: {s} (expected text, json or markdown)"
            )),
        }
    }
}

/// Render a threshold value the way stat files and summaries show it.
/// Integral values keep a trailing `.0`.
pub fn format_value(value: f64) -> String {
    format!("{value:?}")
}

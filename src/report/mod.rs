/// End-of-run summary: SLI evaluation, report model, formatters and artifact.
pub mod json;
pub mod markdown;
pub mod model;
pub mod reporter;
pub mod sli;
pub mod text;

use crate::error::ReportError;

pub use json::JsonFormatter;
pub use markdown::MarkdownFormatter;
pub use model::{CheckStatus, Field, Report, Section, Verdict};
pub use reporter::Reporter;
pub use sli::{SliCheck, SliTargets, SliVerdict};
pub use text::TextFormatter;

/// Trait for report renderers.
pub trait Formatter {
    /// Render a complete report.
    fn format(&self, report: &Report) -> Result<String, ReportError>;
}

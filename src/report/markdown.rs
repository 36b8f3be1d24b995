/// Markdown rendering of the report.
use crate::error::ReportError;
use crate::report::model::Report;
use crate::report::Formatter;

/// Markdown formatter for pasting results into pull requests or wikis.
#[derive(Debug, Default)]
pub struct MarkdownFormatter;

impl MarkdownFormatter {
    pub fn new() -> Self {
        Self
    }
}

impl Formatter for MarkdownFormatter {
    fn format(&self, report: &Report) -> Result<String, ReportError> {
        let mut output = vec![format!("# {}", report.title), String::new()];

        for section in &report.sections {
            output.push(format!("## {}", section.title));
            output.push(String::new());
            output.push("| Metric | Value | Status |".to_string());
            output.push("|--------|-------|--------|".to_string());
            for field in &section.fields {
                let status = field.status.map(|s| s.glyph()).unwrap_or("");
                output.push(format!("| {} | {} | {} |", field.label, field.value, status));
            }
            output.push(String::new());
        }

        output.push(format!("**{}**", report.verdict.message));
        Ok(output.join("\n"))
    }
}

/// JSON rendering of the report model.
use crate::error::ReportError;
use crate::report::model::Report;
use crate::report::Formatter;

/// JSON formatter for scripting.
#[derive(Debug, Default)]
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn new() -> Self {
        Self
    }
}

impl Formatter for JsonFormatter {
    fn format(&self, report: &Report) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(report)?)
    }
}

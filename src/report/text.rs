/// Plain-text report for terminals.
use crate::error::ReportError;
use crate::report::model::{CheckStatus, Field, Report};
use crate::report::Formatter;
use colored::Colorize;

const RULE_WIDTH: usize = 43;

/// Text formatter with optional ANSI colours.
pub struct TextFormatter {
    indent: String,
    colors: bool,
}

impl TextFormatter {
    /// Create a new text formatter.
    ///
    /// # Arguments
    ///
    /// * `indent` - Prefix applied to every line.
    /// * `colors` - Whether to colour glyphs and the verdict.
    pub fn new(indent: impl Into<String>, colors: bool) -> Self {
        Self {
            indent: indent.into(),
            colors,
        }
    }

    fn glyph(&self, status: CheckStatus) -> String {
        let glyph = status.glyph();
        if !self.colors {
            return glyph.to_string();
        }
        match status {
            CheckStatus::Pass => glyph.green().to_string(),
            CheckStatus::Fail => glyph.red().to_string(),
        }
    }

    fn field_line(&self, field: &Field) -> String {
        match field.status {
            Some(status) => format!(
                "{}  • {}: {} ({})",
                self.indent,
                field.label,
                self.glyph(status),
                field.value
            ),
            None => format!("{}  • {}: {}", self.indent, field.label, field.value),
        }
    }
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self::new(" ", true)
    }
}

impl Formatter for TextFormatter {
    fn format(&self, report: &Report) -> Result<String, ReportError> {
        let rule = format!("{}{}", self.indent, "═".repeat(RULE_WIDTH));
        let mut output = vec![
            rule.clone(),
            format!("{}  {}", self.indent, report.title),
            rule.clone(),
        ];

        for section in &report.sections {
            output.push(format!("{}{}:", self.indent, section.title));
            output.extend(section.fields.iter().map(|field| self.field_line(field)));
            output.push(String::new());
        }

        let verdict = if !self.colors {
            report.verdict.message.clone()
        } else if report.verdict.passed {
            report.verdict.message.green().bold().to_string()
        } else {
            report.verdict.message.red().bold().to_string()
        };
        output.push(format!("{}{}", self.indent, verdict));
        output.push(rule);

        Ok(output.join("\n"))
    }
}

/// Error types for the prload crate.
use thiserror::Error;

/// Errors raised while turning aggregate statistics into a report.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Missing metric in summary: {metric}")]
    MissingMetric { metric: String },

    #[error("Missing field '{field}' for metric {metric}")]
    MissingField { metric: String, field: String },

    #[error("Failed to write summary artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid summary JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while parsing or evaluating threshold expressions.
#[derive(Error, Debug, PartialEq)]
pub enum ThresholdError {
    #[error("Invalid threshold expression '{expression}': {reason}")]
    Parse { expression: String, reason: String },

    #[error("Threshold references unknown metric: {metric}")]
    UnknownMetric { metric: String },

    #[error("Threshold '{expression}' references unknown aggregate for {metric}")]
    UnknownAggregate { metric: String, expression: String },
}

/// Application-level errors.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    #[error("Threshold error: {0}")]
    Threshold(#[from] ThresholdError),

    #[error("{crossed} of {total} thresholds crossed")]
    ThresholdsCrossed { crossed: usize, total: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

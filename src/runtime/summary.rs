/// Aggregate statistics produced at the end of a run.
use crate::error::ReportError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// How a metric aggregates its samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
    Rate,
    Trend,
}

impl MetricKind {
    /// Aggregate names a summary of this kind carries.
    pub fn aggregates(&self) -> &'static [&'static str] {
        match self {
            MetricKind::Counter => &["count", "rate"],
            MetricKind::Gauge => &["value", "min", "max"],
            MetricKind::Rate => &["rate", "passes", "fails"],
            MetricKind::Trend => &["avg", "min", "med", "max", "p(90)", "p(95)", "p(99)"],
        }
    }
}

/// Unit hint for the values of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueContains {
    Default,
    Time,
}

/// Outcome of a single threshold expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdOutcome {
    pub ok: bool,
}

/// Final values of one metric or sub-metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    #[serde(rename = "type")]
    pub kind: MetricKind,
    pub contains: ValueContains,
    pub values: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub thresholds: BTreeMap<String, ThresholdOutcome>,
}

/// Run-level facts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    /// Wall-clock length of the run, graceful stop included.
    pub test_run_duration_ms: f64,
}

/// The aggregate-statistics object handed to the reporter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryData {
    pub metrics: BTreeMap<String, MetricSummary>,
    pub state: RunState,
}

impl SummaryData {
    /// Look up a metric by key.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::MissingMetric` if the run never produced it.
    pub fn metric(&self, key: &str) -> Result<&MetricSummary, ReportError> {
        self.metrics
            .get(key)
            .ok_or_else(|| ReportError::MissingMetric {
                metric: key.to_string(),
            })
    }

    /// Look up a single aggregate value of a metric.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::MissingMetric` or `ReportError::MissingField`.
    pub fn value(&self, key: &str, field: &str) -> Result<f64, ReportError> {
        self.metric(key)?
            .values
            .get(field)
            .copied()
            .ok_or_else(|| ReportError::MissingField {
                metric: key.to_string(),
                field: field.to_string(),
            })
    }

    /// Pretty JSON rendering of the whole object.
    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Persist the snapshot as pretty JSON.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<(), ReportError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Load a snapshot previously written with [`SummaryData::write_to`].
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ReportError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// `(crossed, total)` over every evaluated threshold.
    pub fn threshold_tally(&self) -> (usize, usize) {
        self.metrics
            .values()
            .flat_map(|metric| metric.thresholds.values())
            .fold((0, 0), |(crossed, total), outcome| {
                (crossed + usize::from(!outcome.ok), total + 1)
            })
    }
}

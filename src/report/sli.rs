/// Service level indicator targets and their evaluation.
use crate::error::ReportError;
use crate::runtime::metrics::{HTTP_REQS, HTTP_REQ_DURATION, HTTP_REQ_FAILED};
use crate::runtime::summary::SummaryData;
use serde::{Deserialize, Serialize};

/// Targets a run must meet to be considered healthy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SliTargets {
    /// Lowest acceptable request throughput.
    pub min_rps: f64,
    /// p95 latency must stay strictly below this many milliseconds.
    pub max_p95_ms: f64,
    /// `http_req_failed` rate must stay strictly below this fraction.
    pub max_failure_rate: f64,
}

impl Default for SliTargets {
    fn default() -> Self {
        Self {
            min_rps: 5.0,
            max_p95_ms: 300.0,
            max_failure_rate: 0.001,
        }
    }
}

/// Outcome of one SLI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SliCheck {
    pub label: String,
    pub passed: bool,
    /// Observed value, formatted for display.
    pub observed: String,
}

/// Outcome of every SLI of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SliVerdict {
    pub checks: Vec<SliCheck>,
}

impl SliVerdict {
    /// True only when every check passed.
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|check| check.passed)
    }
}

impl SliTargets {
    /// Evaluate throughput, p95 latency and failure rate against the targets.
    ///
    /// # Errors
    ///
    /// Returns a `ReportError` if any of the three aggregates is missing.
    pub fn evaluate(&self, summary: &SummaryData) -> Result<SliVerdict, ReportError> {
        let rps = summary.value(HTTP_REQS, "rate")?;
        let p95 = summary.value(HTTP_REQ_DURATION, "p(95)")?;
        let failure_rate = summary.value(HTTP_REQ_FAILED, "rate")?;

        let checks = vec![
            SliCheck {
                label: format!("RPS ≥ {}", trim_number(self.min_rps)),
                passed: rps >= self.min_rps,
                observed: format!("{:.2}", rps),
            },
            SliCheck {
                label: format!("P95 < {}ms", trim_number(self.max_p95_ms)),
                passed: p95 < self.max_p95_ms,
                observed: format!("{:.2}ms", p95),
            },
            SliCheck {
                label: format!(
                    "Success ≥ {}%",
                    trim_number((1.0 - self.max_failure_rate) * 100.0)
                ),
                passed: failure_rate < self.max_failure_rate,
                observed: format!("{:.2}%", (1.0 - failure_rate) * 100.0),
            },
        ];

        Ok(SliVerdict { checks })
    }
}

/// `5.0` as `5`, `99.900000001` as `99.9`.
fn trim_number(value: f64) -> String {
    let text = format!("{:.3}", value);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

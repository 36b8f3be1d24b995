/// Structured report built from the aggregate statistics.
use crate::error::ReportError;
use crate::report::sli::SliTargets;
use crate::runtime::metrics::{
    DROPPED_ITERATIONS, ERRORS, HTTP_REQS, HTTP_REQ_DURATION, ITERATIONS, SUCCESS,
};
use crate::runtime::summary::SummaryData;
use serde::Serialize;

pub const REPORT_TITLE: &str = "LOAD TEST RESULTS";

/// Pass/fail marker attached to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Fail,
}

impl CheckStatus {
    pub fn from_passed(passed: bool) -> Self {
        if passed {
            CheckStatus::Pass
        } else {
            CheckStatus::Fail
        }
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            CheckStatus::Pass => "✓",
            CheckStatus::Fail => "✗",
        }
    }
}

/// One labelled value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub label: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CheckStatus>,
}

impl Field {
    fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            status: None,
        }
    }

    fn check(label: impl Into<String>, value: impl Into<String>, passed: bool) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            status: Some(CheckStatus::from_passed(passed)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub title: String,
    pub fields: Vec<Field>,
}

/// Overall outcome line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub passed: bool,
    pub message: String,
}

/// Presentation-independent end-of-run report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub title: String,
    pub sections: Vec<Section>,
    pub verdict: Verdict,
}

impl Report {
    /// Build the report, failing if any required aggregate is missing.
    pub fn from_summary(summary: &SummaryData, targets: &SliTargets) -> Result<Self, ReportError> {
        let mut overview = vec![
            Field::new(
                "Total requests",
                format!("{:.0}", summary.value(HTTP_REQS, "count")?),
            ),
            Field::new(
                "Successful",
                format!("{:.2}%", summary.value(SUCCESS, "rate")? * 100.0),
            ),
            Field::new(
                "Errors",
                format!("{:.3}%", summary.value(ERRORS, "rate")? * 100.0),
            ),
            Field::new("RPS", format!("{:.2}", summary.value(HTTP_REQS, "rate")?)),
        ];
        if let Ok(iterations) = summary.value(ITERATIONS, "count") {
            overview.push(Field::new("Iterations", format!("{:.0}", iterations)));
        }
        if let Ok(dropped) = summary.value(DROPPED_ITERATIONS, "count") {
            overview.push(Field::new("Dropped iterations", format!("{:.0}", dropped)));
        }
        // A plain tally; only the SLI section carries pass/fail marks.
        let (crossed, total) = summary.threshold_tally();
        if total > 0 {
            overview.push(Field::new(
                "Thresholds",
                format!("{}/{} passed", total - crossed, total),
            ));
        }

        let latency = [
            ("Average", "avg"),
            ("Median", "med"),
            ("P95", "p(95)"),
            ("P99", "p(99)"),
            ("Max", "max"),
        ]
        .iter()
        .map(|(label, field)| {
            summary
                .value(HTTP_REQ_DURATION, field)
                .map(|value| Field::new(*label, format!("{:.2}ms", value)))
        })
        .collect::<Result<Vec<_>, _>>()?;

        let verdict = targets.evaluate(summary)?;
        let sli = verdict
            .checks
            .iter()
            .map(|check| Field::check(check.label.clone(), check.observed.clone(), check.passed))
            .collect();

        let passed = verdict.passed();
        Ok(Self {
            title: REPORT_TITLE.to_string(),
            sections: vec![
                Section {
                    title: "Overview".to_string(),
                    fields: overview,
                },
                Section {
                    title: "Response time (ms)".to_string(),
                    fields: latency,
                },
                Section {
                    title: "SLI checks".to_string(),
                    fields: sli,
                },
            ],
            verdict: Verdict {
                passed,
                message: if passed {
                    "ALL SLIs MET".to_string()
                } else {
                    "SOME SLIs NOT MET".to_string()
                },
            },
        })
    }

    pub fn section(&self, title: &str) -> Option<&Section> {
        self.sections.iter().find(|section| section.title == title)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::runtime::metrics::*;
    use crate::runtime::summary::{
        MetricKind, MetricSummary, RunState, SummaryData, ValueContains,
    };
    use std::collections::BTreeMap;

    fn metric(kind: MetricKind, values: &[(&str, f64)]) -> MetricSummary {
        MetricSummary {
            kind,
            contains: if kind == MetricKind::Trend {
                ValueContains::Time
            } else {
                ValueContains::Default
            },
            values: values
                .iter()
                .map(|(key, value)| (key.to_string(), *value))
                .collect(),
            thresholds: BTreeMap::new(),
        }
    }

    /// A complete two-minute run with the given headline numbers.
    pub fn summary(rps: f64, p95: f64, failure_rate: f64) -> SummaryData {
        let mut metrics = BTreeMap::new();
        metrics.insert(
            HTTP_REQS.to_string(),
            metric(MetricKind::Counter, &[("count", rps * 120.0), ("rate", rps)]),
        );
        metrics.insert(
            HTTP_REQ_DURATION.to_string(),
            metric(
                MetricKind::Trend,
                &[
                    ("avg", p95 / 2.0),
                    ("min", 1.0),
                    ("med", p95 / 2.5),
                    ("max", p95 * 1.5),
                    ("p(90)", p95 * 0.9),
                    ("p(95)", p95),
                    ("p(99)", p95 * 1.2),
                ],
            ),
        );
        metrics.insert(
            HTTP_REQ_FAILED.to_string(),
            metric(MetricKind::Rate, &[("rate", failure_rate)]),
        );
        metrics.insert(
            ERRORS.to_string(),
            metric(MetricKind::Rate, &[("rate", failure_rate)]),
        );
        metrics.insert(
            SUCCESS.to_string(),
            metric(MetricKind::Rate, &[("rate", 1.0 - failure_rate)]),
        );

        SummaryData {
            metrics,
            state: RunState {
                test_run_duration_ms: 120_000.0,
            },
        }
    }
}

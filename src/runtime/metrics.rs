/// In-process metric registry the workload records into.
use crate::runtime::summary::{
    MetricKind, MetricSummary, RunState, SummaryData, ValueContains,
};
use hdrhistogram::Histogram;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::Duration;

pub const HTTP_REQS: &str = "http_reqs";
pub const HTTP_REQ_DURATION: &str = "http_req_duration";
pub const HTTP_REQ_FAILED: &str = "http_req_failed";
pub const CHECKS: &str = "checks";
pub const ERRORS: &str = "errors";
pub const SUCCESS: &str = "success";
pub const RESPONSE_TIME: &str = "response_time";
pub const ITERATIONS: &str = "iterations";
pub const DROPPED_ITERATIONS: &str = "dropped_iterations";
pub const VUS_MAX: &str = "vus_max";

/// Every metric the runtime can produce, with its kind and unit.
pub const KNOWN_METRICS: [(&str, MetricKind, ValueContains); 10] = [
    (HTTP_REQS, MetricKind::Counter, ValueContains::Default),
    (HTTP_REQ_DURATION, MetricKind::Trend, ValueContains::Time),
    (HTTP_REQ_FAILED, MetricKind::Rate, ValueContains::Default),
    (CHECKS, MetricKind::Rate, ValueContains::Default),
    (ERRORS, MetricKind::Rate, ValueContains::Default),
    (SUCCESS, MetricKind::Rate, ValueContains::Default),
    (RESPONSE_TIME, MetricKind::Trend, ValueContains::Time),
    (ITERATIONS, MetricKind::Counter, ValueContains::Default),
    (DROPPED_ITERATIONS, MetricKind::Counter, ValueContains::Default),
    (VUS_MAX, MetricKind::Gauge, ValueContains::Default),
];

/// Kind and unit of a known metric name.
pub fn describe(name: &str) -> Option<(MetricKind, ValueContains)> {
    KNOWN_METRICS
        .iter()
        .find(|(known, _, _)| *known == name)
        .map(|(_, kind, contains)| (*kind, *contains))
}

/// Key of the sub-metric holding only samples tagged with `endpoint`.
pub fn submetric_key(name: &str, endpoint: &str) -> String {
    format!("{}{{endpoint:{}}}", name, endpoint)
}

/// Split a metric key into its base name and optional endpoint tag.
pub fn split_key(key: &str) -> Option<(&str, Option<&str>)> {
    match key.split_once('{') {
        None => Some((key, None)),
        Some((name, rest)) => {
            let tag = rest.strip_suffix('}')?.strip_prefix("endpoint:")?;
            if tag.is_empty() {
                return None;
            }
            Some((name, Some(tag)))
        }
    }
}

// 1µs to 60s at three significant digits.
const HISTOGRAM_LOW_US: u64 = 1;
const HISTOGRAM_HIGH_US: u64 = 60_000_000;
const HISTOGRAM_SIGFIG: u8 = 3;

/// Latency distribution with exact min/max/mean and histogram percentiles.
struct TrendSeries {
    histogram: Histogram<u64>,
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
}

impl TrendSeries {
    fn new() -> Self {
        Self {
            histogram: Histogram::new_with_bounds(
                HISTOGRAM_LOW_US,
                HISTOGRAM_HIGH_US,
                HISTOGRAM_SIGFIG,
            )
            .expect("static histogram bounds are valid"),
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    fn record(&mut self, value_ms: f64) {
        let value_ms = if value_ms.is_finite() { value_ms.max(0.0) } else { 0.0 };
        self.histogram
            .saturating_record((value_ms * 1000.0).round() as u64);
        self.count += 1;
        self.sum += value_ms;
        self.min = self.min.min(value_ms);
        self.max = self.max.max(value_ms);
    }

    fn quantile(&self, q: f64) -> f64 {
        let value = self.histogram.value_at_quantile(q) as f64 / 1000.0;
        value.clamp(self.min, self.max)
    }

    fn values(&self) -> BTreeMap<String, f64> {
        let mut values = BTreeMap::new();
        if self.count == 0 {
            return values;
        }
        values.insert("avg".to_string(), self.sum / self.count as f64);
        values.insert("min".to_string(), self.min);
        values.insert("med".to_string(), self.quantile(0.50));
        values.insert("max".to_string(), self.max);
        values.insert("p(90)".to_string(), self.quantile(0.90));
        values.insert("p(95)".to_string(), self.quantile(0.95));
        values.insert("p(99)".to_string(), self.quantile(0.99));
        values
    }
}

enum Series {
    Counter { count: f64 },
    Gauge { value: f64, min: f64, max: f64 },
    Rate { passes: u64, total: u64 },
    Trend(Box<TrendSeries>),
}

impl Series {
    fn kind(&self) -> MetricKind {
        match self {
            Series::Counter { .. } => MetricKind::Counter,
            Series::Gauge { .. } => MetricKind::Gauge,
            Series::Rate { .. } => MetricKind::Rate,
            Series::Trend(_) => MetricKind::Trend,
        }
    }

    fn values(&self, duration_secs: f64) -> BTreeMap<String, f64> {
        let mut values = BTreeMap::new();
        match self {
            Series::Counter { count } => {
                let rate = if duration_secs > 0.0 {
                    count / duration_secs
                } else {
                    0.0
                };
                values.insert("count".to_string(), *count);
                values.insert("rate".to_string(), rate);
            }
            Series::Gauge { value, min, max } => {
                values.insert("value".to_string(), *value);
                values.insert("min".to_string(), *min);
                values.insert("max".to_string(), *max);
            }
            Series::Rate { passes, total } => {
                let rate = if *total > 0 {
                    *passes as f64 / *total as f64
                } else {
                    0.0
                };
                values.insert("rate".to_string(), rate);
                values.insert("passes".to_string(), *passes as f64);
                values.insert("fails".to_string(), (total - passes) as f64);
            }
            Series::Trend(trend) => return trend.values(),
        }
        values
    }
}

/// Thread-safe registry of every metric observed during a run.
///
/// Observations carrying an endpoint tag are recorded into both the bare
/// metric and its `name{endpoint:tag}` sub-metric.
pub struct MetricsRegistry {
    series: Mutex<BTreeMap<String, Series>>,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            series: Mutex::new(BTreeMap::new()),
        }
    }

    fn keys(name: &str, tag: Option<&str>) -> Vec<String> {
        match tag {
            Some(tag) => vec![name.to_string(), submetric_key(name, tag)],
            None => vec![name.to_string()],
        }
    }

    fn update<F>(&self, name: &str, tag: Option<&str>, init: fn() -> Series, mut apply: F)
    where
        F: FnMut(&mut Series),
    {
        let mut series = self.series.lock();
        for key in Self::keys(name, tag) {
            apply(series.entry(key).or_insert_with(init));
        }
    }

    /// Add to a counter.
    pub fn add_counter(&self, name: &str, tag: Option<&str>, delta: f64) {
        self.update(name, tag, || Series::Counter { count: 0.0 }, |series| {
            if let Series::Counter { count } = series {
                *count += delta;
            }
        });
    }

    /// Set a gauge, keeping track of its extremes.
    pub fn set_gauge(&self, name: &str, value: f64) {
        self.update(
            name,
            None,
            || Series::Gauge {
                value: 0.0,
                min: f64::INFINITY,
                max: f64::NEG_INFINITY,
            },
            |series| {
                if let Series::Gauge {
                    value: current,
                    min,
                    max,
                } = series
                {
                    *current = value;
                    *min = min.min(value);
                    *max = max.max(value);
                }
            },
        );
    }

    /// Record a boolean observation.
    pub fn add_rate(&self, name: &str, tag: Option<&str>, pass: bool) {
        self.update(name, tag, || Series::Rate { passes: 0, total: 0 }, |series| {
            if let Series::Rate { passes, total } = series {
                *passes += u64::from(pass);
                *total += 1;
            }
        });
    }

    /// Record a duration in milliseconds.
    pub fn add_trend(&self, name: &str, tag: Option<&str>, value_ms: f64) {
        self.update(
            name,
            tag,
            || Series::Trend(Box::new(TrendSeries::new())),
            |series| {
                if let Series::Trend(trend) = series {
                    trend.record(value_ms);
                }
            },
        );
    }

    /// Record the built-in metrics of one HTTP call.
    ///
    /// `status` is `None` when the call never produced a response; such calls
    /// and statuses outside 200..400 count as failed requests.
    pub fn record_http_request(&self, endpoint: &str, status: Option<u16>, duration_ms: f64) {
        let failed = status.map_or(true, |status| !(200..400).contains(&status));
        self.add_counter(HTTP_REQS, Some(endpoint), 1.0);
        self.add_trend(HTTP_REQ_DURATION, Some(endpoint), duration_ms);
        self.add_rate(HTTP_REQ_FAILED, Some(endpoint), failed);
    }

    /// Freeze the current values into a summary.
    pub fn snapshot(&self, run_duration: Duration) -> SummaryData {
        let duration_secs = run_duration.as_secs_f64();
        let series = self.series.lock();

        let metrics = series
            .iter()
            .map(|(key, series)| {
                let contains = split_key(key)
                    .and_then(|(name, _)| describe(name))
                    .map(|(_, contains)| contains)
                    .unwrap_or(ValueContains::Default);
                (
                    key.clone(),
                    MetricSummary {
                        kind: series.kind(),
                        contains,
                        values: series.values(duration_secs),
                        thresholds: BTreeMap::new(),
                    },
                )
            })
            .collect();

        SummaryData {
            metrics,
            state: RunState {
                test_run_duration_ms: duration_secs * 1000.0,
            },
        }
    }
}

/// Host runtime: arrival-rate executor, metric registry and thresholds.
pub mod executor;
pub mod metrics;
pub mod summary;
pub mod threshold;

pub use executor::{ArrivalRateExecutor, ExecutionStats, Iteration};
pub use metrics::MetricsRegistry;
pub use summary::{MetricKind, MetricSummary, RunState, SummaryData, ValueContains};
pub use threshold::{Threshold, ThresholdSet};

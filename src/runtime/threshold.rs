/// Pass/fail criteria over summary aggregates.
use crate::error::ThresholdError;
use crate::http::endpoint::Endpoint;
use crate::runtime::metrics::{describe, split_key};
use crate::runtime::summary::{SummaryData, ThresholdOutcome};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Comparison operator of a threshold expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Comparison {
    // Two-character operators first so `<=` is not read as `<`.
    const TOKENS: [(&'static str, Comparison); 6] = [
        ("<=", Comparison::Le),
        (">=", Comparison::Ge),
        ("==", Comparison::Eq),
        ("!=", Comparison::Ne),
        ("<", Comparison::Lt),
        (">", Comparison::Gt),
    ];

    fn holds(&self, left: f64, right: f64) -> bool {
        match self {
            Comparison::Lt => left < right,
            Comparison::Le => left <= right,
            Comparison::Gt => left > right,
            Comparison::Ge => left >= right,
            Comparison::Eq => left == right,
            Comparison::Ne => left != right,
        }
    }

}

/// One `<aggregate><op><number>` expression, e.g. `p(95)<300`.
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    /// Text as written in the configuration; used as the outcome key.
    pub source: String,
    pub aggregate: String,
    pub comparison: Comparison,
    pub bound: f64,
}

impl Threshold {
    /// Whether an observed aggregate value satisfies the threshold.
    pub fn check(&self, observed: f64) -> bool {
        self.comparison.holds(observed, self.bound)
    }
}

impl FromStr for Threshold {
    type Err = ThresholdError;

    fn from_str(expression: &str) -> Result<Self, Self::Err> {
        let parse_error = |reason: &str| ThresholdError::Parse {
            expression: expression.to_string(),
            reason: reason.to_string(),
        };

        let compact: String = expression.chars().filter(|c| !c.is_whitespace()).collect();
        let (position, token, comparison) = Comparison::TOKENS
            .iter()
            .filter_map(|(token, comparison)| {
                compact.find(token).map(|position| (position, *token, *comparison))
            })
            .min_by_key(|(position, token, _)| (*position, std::cmp::Reverse(token.len())))
            .ok_or_else(|| parse_error("missing comparison operator"))?;

        let aggregate = &compact[..position];
        let bound = &compact[position + token.len()..];
        if aggregate.is_empty() {
            return Err(parse_error("missing aggregate"));
        }
        let bound: f64 = bound
            .parse()
            .map_err(|_| parse_error("right-hand side is not a number"))?;
        if !bound.is_finite() {
            return Err(parse_error("right-hand side must be finite"));
        }

        Ok(Self {
            source: expression.to_string(),
            aggregate: aggregate.to_string(),
            comparison,
            bound,
        })
    }
}

/// All thresholds of a run, validated against the known metrics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThresholdSet {
    entries: BTreeMap<String, Vec<Threshold>>,
}

impl ThresholdSet {
    /// Parse and validate threshold expressions keyed by metric.
    ///
    /// # Errors
    ///
    /// Fails on malformed expressions, unknown metric names, tags that name
    /// no endpoint, and aggregates the metric's kind does not produce.
    pub fn parse(raw: &BTreeMap<String, Vec<String>>) -> Result<Self, ThresholdError> {
        let mut entries = BTreeMap::new();

        for (key, expressions) in raw {
            let unknown = || ThresholdError::UnknownMetric {
                metric: key.clone(),
            };
            let (name, tag) = split_key(key).ok_or_else(unknown)?;
            let (kind, _) = describe(name).ok_or_else(unknown)?;
            if let Some(tag) = tag {
                Endpoint::from_tag(tag).ok_or_else(unknown)?;
            }

            let mut parsed = Vec::with_capacity(expressions.len());
            for expression in expressions {
                let threshold: Threshold = expression.parse()?;
                if !kind.aggregates().contains(&threshold.aggregate.as_str()) {
                    return Err(ThresholdError::UnknownAggregate {
                        metric: key.clone(),
                        expression: expression.clone(),
                    });
                }
                parsed.push(threshold);
            }
            entries.insert(key.clone(), parsed);
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record each threshold's outcome on its metric and return
    /// `(crossed, evaluated)`.
    ///
    /// Metrics the run never sampled are skipped; their thresholds are
    /// neither passed nor crossed.
    pub fn evaluate(&self, summary: &mut SummaryData) -> (usize, usize) {
        let mut crossed = 0;
        let mut evaluated = 0;

        for (key, thresholds) in &self.entries {
            let Some(metric) = summary.metrics.get_mut(key) else {
                tracing::debug!(metric = %key, "skipping thresholds for unsampled metric");
                continue;
            };

            for threshold in thresholds {
                let Some(observed) = metric.values.get(&threshold.aggregate).copied() else {
                    continue;
                };
                let ok = threshold.check(observed);
                if !ok {
                    crossed += 1;
                    tracing::warn!(
                        metric = %key,
                        threshold = %threshold.source,
                        observed,
                        "threshold crossed"
                    );
                }
                evaluated += 1;
                metric
                    .thresholds
                    .insert(threshold.source.clone(), ThresholdOutcome { ok });
            }
        }

        (crossed, evaluated)
    }
}

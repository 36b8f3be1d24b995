/// Load profile, workflow and reporting configuration.
use crate::error::AppError;
use crate::http::endpoint::Endpoint;
use crate::report::sli::SliTargets;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the persisted summary snapshot.
pub const DEFAULT_SUMMARY_PATH: &str = "load_test_results.json";

/// Complete configuration for one load test run.
///
/// Every section falls back to its defaults, so a TOML file only needs to
/// name the values it changes.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LoadConfig {
    /// Service under test and credentials.
    pub target: TargetConfig,
    /// Arrival-rate scenario.
    pub scenario: ScenarioConfig,
    /// Per-iteration workflow shaping.
    pub workflow: WorkflowConfig,
    /// SLI targets used by the summary report.
    pub sli: SliTargets,
    /// Threshold expressions keyed by metric (or sub-metric) name.
    pub thresholds: BTreeMap<String, Vec<String>>,
    /// Report artifacts.
    pub output: OutputConfig,
}

/// Service under test.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TargetConfig {
    /// Base URL every endpoint path is appended to.
    pub base_url: String,
    /// Bearer token with administrative privileges (create/deactivate).
    pub admin_token: String,
    /// Bearer token with ordinary privileges (stats).
    pub user_token: String,
    /// Per-request timeout.
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
    /// Extra headers sent with every request.
    pub headers: BTreeMap<String, String>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            admin_token: "admin-secret".to_string(),
            user_token: "user-secret".to_string(),
            timeout: Duration::from_secs(60),
            headers: BTreeMap::new(),
        }
    }
}

/// Constant-arrival-rate scenario.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Iterations started per `time_unit`.
    pub rate: u32,
    #[serde(deserialize_with = "deserialize_duration")]
    pub time_unit: Duration,
    /// How long new iterations keep being started.
    #[serde(deserialize_with = "deserialize_duration")]
    pub duration: Duration,
    /// Slots allocated before the run starts.
    pub pre_allocated: usize,
    /// Upper bound on concurrently running iterations.
    pub max_slots: usize,
    /// Time in-flight iterations get to finish once `duration` has elapsed.
    #[serde(deserialize_with = "deserialize_duration")]
    pub graceful_stop: Duration,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            rate: 5,
            time_unit: Duration::from_secs(1),
            duration: Duration::from_secs(120),
            pre_allocated: 10,
            max_slots: 50,
            graceful_stop: Duration::from_secs(30),
        }
    }
}

impl ScenarioConfig {
    /// Gap between two consecutive iteration starts.
    pub fn period(&self) -> Duration {
        self.time_unit / self.rate.max(1)
    }

    /// Number of iterations the scenario intends to start.
    pub fn expected_iterations(&self) -> u64 {
        let units = self.duration.as_secs_f64() / self.time_unit.as_secs_f64();
        (units * f64::from(self.rate)).round() as u64
    }
}

/// Shape of a single iteration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct WorkflowConfig {
    /// Probability that an iteration creates a team (p₁).
    pub create_team_probability: f64,
    /// Probability that a successful PR creation is followed by a deactivation (p₂).
    pub deactivate_probability: f64,
    /// Pause between dependent write steps.
    #[serde(deserialize_with = "deserialize_duration")]
    pub step_pause: Duration,
    /// Pause at the end of every iteration.
    #[serde(deserialize_with = "deserialize_duration")]
    pub iteration_pause: Duration,
    /// Per-endpoint latency bounds used by the call checks.
    pub latency: LatencyBounds,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            create_team_probability: 0.3,
            deactivate_probability: 0.2,
            step_pause: Duration::from_millis(100),
            iteration_pause: Duration::from_millis(100),
            latency: LatencyBounds::default(),
        }
    }
}

/// Latency a call must stay under for its check to pass.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LatencyBounds {
    #[serde(deserialize_with = "deserialize_duration")]
    pub health: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub stats: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub create_team: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub create_pr: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub deactivate_team: Duration,
}

impl Default for LatencyBounds {
    fn default() -> Self {
        Self {
            health: Duration::from_millis(300),
            stats: Duration::from_millis(300),
            create_team: Duration::from_millis(300),
            create_pr: Duration::from_millis(300),
            deactivate_team: Duration::from_millis(100),
        }
    }
}

impl LatencyBounds {
    /// Bound for the given endpoint.
    pub fn for_endpoint(&self, endpoint: Endpoint) -> Duration {
        match endpoint {
            Endpoint::Health => self.health,
            Endpoint::Stats => self.stats,
            Endpoint::CreateTeam => self.create_team,
            Endpoint::CreatePullRequest => self.create_pr,
            Endpoint::DeactivateTeam => self.deactivate_team,
        }
    }
}

/// Report artifacts.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Where the JSON snapshot of the aggregate statistics is written.
    pub summary_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            summary_path: PathBuf::from(DEFAULT_SUMMARY_PATH),
        }
    }
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            target: TargetConfig::default(),
            scenario: ScenarioConfig::default(),
            workflow: WorkflowConfig::default(),
            sli: SliTargets::default(),
            thresholds: default_thresholds(),
            output: OutputConfig::default(),
        }
    }
}

/// Thresholds applied when the configuration does not name any.
pub fn default_thresholds() -> BTreeMap<String, Vec<String>> {
    let entries: [(&str, &str); 9] = [
        ("http_req_duration", "p(95)<300"),
        ("http_req_duration{endpoint:health}", "p(95)<100"),
        ("http_req_duration{endpoint:create_team}", "p(95)<300"),
        ("http_req_duration{endpoint:create_pr}", "p(95)<300"),
        ("http_req_duration{endpoint:stats}", "p(95)<300"),
        ("http_req_duration{endpoint:deactivate_team}", "p(95)<100"),
        ("http_req_failed", "rate<0.001"),
        ("errors", "rate<0.001"),
        ("success", "rate>0.999"),
    ];

    entries
        .iter()
        .map(|(metric, expr)| (metric.to_string(), vec![expr.to_string()]))
        .collect()
}

impl LoadConfig {
    /// Load configuration from a TOML file, filling gaps with defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, AppError> {
        Ok(toml::from_str(content)?)
    }

    /// Reject configurations the executor or workflow cannot honour.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.target.base_url.trim().is_empty() {
            return Err(AppError::Config("base_url cannot be empty".to_string()));
        }
        if !self.target.base_url.starts_with("http://")
            && !self.target.base_url.starts_with("https://")
        {
            return Err(AppError::Config(format!(
                "base_url must start with http:// or https://, got '{}'",
                self.target.base_url
            )));
        }

        let scenario = &self.scenario;
        if scenario.rate == 0 {
            return Err(AppError::Config("rate must be greater than zero".into()));
        }
        if scenario.time_unit.is_zero() || scenario.period().is_zero() {
            return Err(AppError::Config(format!(
                "time_unit {:?} is too small for rate {}",
                scenario.time_unit, scenario.rate
            )));
        }
        if scenario.duration.is_zero() {
            return Err(AppError::Config("duration must be greater than zero".into()));
        }
        if scenario.max_slots == 0 {
            return Err(AppError::Config("max_slots must be greater than zero".into()));
        }
        if scenario.max_slots < scenario.pre_allocated {
            return Err(AppError::Config(format!(
                "max_slots ({}) cannot be lower than pre_allocated ({})",
                scenario.max_slots, scenario.pre_allocated
            )));
        }

        for (name, value) in [
            ("create_team_probability", self.workflow.create_team_probability),
            ("deactivate_probability", self.workflow.deactivate_probability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AppError::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        if self.target.timeout.is_zero() {
            return Err(AppError::Config("timeout must be greater than zero".into()));
        }
        for endpoint in Endpoint::ALL {
            if self.workflow.latency.for_endpoint(endpoint).is_zero() {
                return Err(AppError::Config(format!(
                    "latency bound for {} must be greater than zero",
                    endpoint.tag()
                )));
            }
        }

        let sli = &self.sli;
        if !(0.0..=1.0).contains(&sli.max_failure_rate) {
            return Err(AppError::Config(format!(
                "max_failure_rate must be within [0, 1], got {}",
                sli.max_failure_rate
            )));
        }
        if !sli.min_rps.is_finite() || sli.min_rps < 0.0 {
            return Err(AppError::Config(format!(
                "min_rps must be non-negative, got {}",
                sli.min_rps
            )));
        }
        if !sli.max_p95_ms.is_finite() || sli.max_p95_ms <= 0.0 {
            return Err(AppError::Config(format!(
                "max_p95_ms must be greater than zero, got {}",
                sli.max_p95_ms
            )));
        }

        Ok(())
    }
}

/// Parse a duration such as `250ms`, `1.5s`, `2m` or `1h`.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let trimmed = input.trim();
    let unit_start = trimmed
        .find(|c: char| c.is_ascii_alphabetic())
        .ok_or_else(|| format!("Missing unit in duration '{}'", input))?;
    let (value, unit) = trimmed.split_at(unit_start);

    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("Invalid number in duration '{}'", input))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("Duration must be non-negative: '{}'", input));
    }

    let seconds = match unit {
        "ms" => value / 1000.0,
        "s" => value,
        "m" => value * 60.0,
        "h" => value * 3600.0,
        other => {
            return Err(format!(
                "Unknown unit '{}' in duration '{}' (use ms, s, m or h)",
                other, input
            ))
        }
    };

    Duration::try_from_secs_f64(seconds)
        .map_err(|e| format!("Duration out of range '{}': {}", input, e))
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_reference_profile() {
        let config = LoadConfig::default();
        assert_eq!(config.scenario.rate, 5);
        assert_eq!(config.scenario.duration, Duration::from_secs(120));
        assert_eq!(config.scenario.pre_allocated, 10);
        assert_eq!(config.scenario.max_slots, 50);
        assert_eq!(config.workflow.create_team_probability, 0.3);
        assert_eq!(config.workflow.deactivate_probability, 0.2);
        assert_eq!(config.workflow.step_pause, Duration::from_millis(100));
        assert_eq!(
            config.workflow.latency.for_endpoint(Endpoint::DeactivateTeam),
            Duration::from_millis(100)
        );
        assert_eq!(config.thresholds.len(), 9);
        assert_eq!(config.scenario.expected_iterations(), 600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("2s"), Ok(Duration::from_secs(2)));
        assert_eq!(parse_duration(" 2m "), Ok(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
        assert_eq!(parse_duration("1.5s"), Ok(Duration::from_millis(1500)));
    }

    #[test]
    fn parse_duration_rejects_garbage() {
        assert!(parse_duration("100").is_err());
        assert!(parse_duration("ms").is_err());
        assert!(parse_duration("5 days").is_err());
        assert!(parse_duration("-1s").is_err());

        let err = parse_duration("99999999999999999999999h").expect_err("too large");
        assert!(err.contains("out of range"), "unexpected error: {}", err);
    }

    #[test]
    fn oversized_duration_in_toml_is_an_error() {
        let result = LoadConfig::from_toml(
            r#"
            [scenario]
            duration = "99999999999999999999999h"
            "#,
        );
        assert!(matches!(result, Err(AppError::Toml(_))));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = LoadConfig::from_toml(
            r#"
            [target]
            base_url = "http://service:9000"

            [scenario]
            rate = 20
            duration = "30s"

            [workflow]
            create_team_probability = 1.0

            [workflow.latency]
            health = "50ms"
            "#,
        )
        .expect("partial config should parse");

        assert_eq!(config.target.base_url, "http://service:9000");
        assert_eq!(config.target.admin_token, "admin-secret");
        assert_eq!(config.scenario.rate, 20);
        assert_eq!(config.scenario.duration, Duration::from_secs(30));
        assert_eq!(config.scenario.max_slots, 50);
        assert_eq!(config.workflow.create_team_probability, 1.0);
        assert_eq!(config.workflow.latency.health, Duration::from_millis(50));
        assert_eq!(config.workflow.latency.stats, Duration::from_millis(300));
        assert_eq!(config.thresholds, default_thresholds());
    }

    #[test]
    fn toml_thresholds_replace_defaults() {
        let config = LoadConfig::from_toml(
            r#"
            [thresholds]
            http_req_duration = ["p(99)<500", "avg<200"]
            "#,
        )
        .expect("thresholds should parse");

        assert_eq!(config.thresholds.len(), 1);
        assert_eq!(config.thresholds["http_req_duration"].len(), 2);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = LoadConfig::from_toml(
            r#"
            [scenario]
            vus = 10
            "#,
        );
        assert!(matches!(result, Err(AppError::Toml(_))));
    }

    #[test]
    fn bad_duration_in_toml_is_rejected() {
        let result = LoadConfig::from_toml(
            r#"
            [workflow]
            step_pause = "fast"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn validate_rejects_invalid_values() {
        let mut config = LoadConfig::default();
        config.workflow.create_team_probability = 1.5;
        assert!(config.validate().is_err());

        let mut config = LoadConfig::default();
        config.scenario.rate = 0;
        assert!(config.validate().is_err());

        let mut config = LoadConfig::default();
        config.scenario.pre_allocated = 60;
        assert!(config.validate().is_err());

        let mut config = LoadConfig::default();
        config.scenario.duration = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = LoadConfig::default();
        config.target.base_url = "localhost:8080".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_timeouts_and_bad_sli_targets() {
        let mut config = LoadConfig::default();
        config.target.timeout = Duration::ZERO;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        let mut config = LoadConfig::default();
        config.workflow.latency.create_pr = Duration::ZERO;
        let err = config.validate().expect_err("zero latency bound");
        assert!(err.to_string().contains("create_pr"));

        for rate in [-0.1, 1.5, f64::NAN] {
            let mut config = LoadConfig::default();
            config.sli.max_failure_rate = rate;
            assert!(config.validate().is_err(), "max_failure_rate {} accepted", rate);
        }

        let mut config = LoadConfig::default();
        config.sli.max_p95_ms = 0.0;
        assert!(config.validate().is_err());

        let config = LoadConfig::from_toml("[target]\ntimeout = \"0s\"\n").expect("parses");
        assert!(config.validate().is_err());
    }

    #[test]
    fn toml_headers_are_read() {
        let config = LoadConfig::from_toml(
            r#"
            [target.headers]
            X-Load-Test = "prload"
            "#,
        )
        .expect("headers should parse");
        assert_eq!(config.target.headers["X-Load-Test"], "prload");
        assert!(LoadConfig::default().target.headers.is_empty());
    }

    #[test]
    fn from_file_reads_toml() {
        let mut temp = tempfile::NamedTempFile::new().expect("create temp file");
        temp.write_all(b"[output]\nsummary_path = \"out/summary.json\"\n")
            .expect("write config file");

        let config = LoadConfig::from_file(temp.path()).expect("load config from temp file");
        assert_eq!(config.output.summary_path, PathBuf::from("out/summary.json"));
    }

    #[test]
    fn sample_config_spells_out_the_defaults() {
        let config = LoadConfig::from_toml(include_str!("../prload.toml"))
            .expect("sample config should parse");
        assert_eq!(config, LoadConfig::default());
    }

    #[test]
    fn from_file_reports_missing_file() {
        let result = LoadConfig::from_file("/definitely/not/here.toml");
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}

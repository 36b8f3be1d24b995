/// CLI argument parsing and command execution.
use crate::config::{parse_duration, LoadConfig};
use crate::error::AppError;
use crate::http::{ApiClient, ClientConfig, HttpApiClient};
use crate::logging;
use crate::report::{Formatter, JsonFormatter, MarkdownFormatter, Reporter, TextFormatter};
use crate::runtime::{ArrivalRateExecutor, MetricsRegistry, SummaryData, ThresholdSet};
use crate::workload::{Credentials, IterationContext, WorkloadDriver};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// prload - Constant-arrival-rate load tests for the team / pull-request service.
#[derive(Parser, Debug)]
#[command(name = "prload")]
#[command(about = "Drive a constant arrival rate against the review service and report its SLIs")]
#[command(
    long_about = r#"prload - load generator and SLI reporter for the team / pull-request review service

Every iteration reads /health and /stats concurrently, then with some
probability creates a team, opens a pull request for it and deactivates
the team's users. Iterations start at a fixed rate regardless of latency.

At the end of the run the aggregate statistics are written as JSON and a
report checks throughput, p95 latency and failure rate against their targets.

EXAMPLES:
  # Two-minute run at 5 iterations/s against a local deployment
  prload run

  # Heavier profile from a config file, overriding the target
  prload run --config prload.toml --base-url http://staging:8080 --rate 20

  # Re-render an archived summary as markdown
  prload report load_test_results.json --format markdown"#
)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log filter such as `debug` or `prload=trace` (overrides RUST_LOG)
    #[arg(long, value_name = "FILTER", global = true)]
    pub log_level: Option<String>,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the load test and report on it
    Run(RunArgs),
    /// Render the report of a previously written summary
    Report(ReportArgs),
}

/// Report output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
    /// Markdown report format
    Markdown,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Base URL of the service under test
    #[arg(long, env = "PRLOAD_BASE_URL")]
    pub base_url: Option<String>,

    /// Bearer token for team and pull-request writes
    #[arg(long, env = "ADMIN_TOKEN", hide_env_values = true)]
    pub admin_token: Option<String>,

    /// Bearer token for statistics reads
    #[arg(long, env = "USER_TOKEN", hide_env_values = true)]
    pub user_token: Option<String>,

    /// Iterations started per time unit
    #[arg(long)]
    pub rate: Option<u32>,

    /// How long iterations keep being started (e.g. 30s, 2m)
    #[arg(long, value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Slots allocated before the run starts
    #[arg(long)]
    pub pre_allocated: Option<usize>,

    /// Upper bound on concurrently running iterations
    #[arg(long)]
    pub max_slots: Option<usize>,

    /// Where to write the JSON summary
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Report format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Disable ANSI colours in the text report
    #[arg(long)]
    pub no_color: bool,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

impl RunArgs {
    /// Layer file, environment and flag values over the defaults.
    pub fn resolve(&self) -> Result<LoadConfig, AppError> {
        let mut config = match &self.config {
            Some(path) => LoadConfig::from_file(path)?,
            None => LoadConfig::default(),
        };

        if let Some(base_url) = &self.base_url {
            config.target.base_url = base_url.clone();
        }
        if let Some(token) = &self.admin_token {
            config.target.admin_token = token.clone();
        }
        if let Some(token) = &self.user_token {
            config.target.user_token = token.clone();
        }
        if let Some(rate) = self.rate {
            config.scenario.rate = rate;
        }
        if let Some(duration) = self.duration {
            config.scenario.duration = duration;
        }
        if let Some(pre_allocated) = self.pre_allocated {
            config.scenario.pre_allocated = pre_allocated;
        }
        if let Some(max_slots) = self.max_slots {
            config.scenario.max_slots = max_slots;
        }
        if let Some(output) = &self.output {
            config.output.summary_path = output.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Summary JSON written by `prload run`
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// TOML configuration holding the SLI targets
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Report format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Disable ANSI colours in the text report
    #[arg(long)]
    pub no_color: bool,
}

impl Cli {
    /// Execute the selected command.
    pub fn run(self) -> Result<(), AppError> {
        match self.command {
            Command::Run(args) => Self::run_load_test(args),
            Command::Report(args) => Self::render_summary(args),
        }
    }

    fn run_load_test(args: RunArgs) -> Result<(), AppError> {
        let config = args.resolve()?;
        let thresholds = ThresholdSet::parse(&config.thresholds)?;

        let client = Arc::new(HttpApiClient::new(ClientConfig {
            base_url: config.target.base_url.clone(),
            timeout: config.target.timeout,
            headers: config
                .target
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        })?);
        let metrics = Arc::new(MetricsRegistry::new());
        let driver = Arc::new(WorkloadDriver::new(
            client.clone(),
            config.workflow.clone(),
            Credentials {
                admin: config.target.admin_token.clone(),
                user: config.target.user_token.clone(),
            },
            metrics.clone(),
            IterationContext::system(),
        ));
        let executor = ArrivalRateExecutor::new(config.scenario.clone(), metrics.clone());

        tracing::info!(
            target_url = client.base_url(),
            thresholds = thresholds.len(),
            "load test starting"
        );
        if thresholds.is_empty() {
            tracing::warn!("no thresholds configured, the run cannot fail on latency or errors");
        }

        let rt = tokio::runtime::Runtime::new()
            .map_err(|e| AppError::Config(format!("Failed to create async runtime: {}", e)))?;

        let progress_bar = if args.no_progress {
            None
        } else {
            let pb = indicatif::ProgressBar::new(config.scenario.expected_iterations());
            pb.set_style(
                indicatif::ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} iterations {msg}")
                    .expect("valid progress bar template")
                    .progress_chars("#>-"),
            );
            pb.set_message("Running iterations...");
            Some(Arc::new(pb))
        };

        let log_guard = progress_bar.as_deref().map(logging::attach_progress);
        let stats = rt.block_on(executor.run(driver.clone(), progress_bar));
        drop(log_guard);
        tracing::info!(
            started = stats.started,
            completed = stats.completed,
            dropped = stats.dropped,
            interrupted = stats.interrupted,
            teams = driver.context().sequences.teams_created(),
            pull_requests = driver.context().sequences.pull_requests_created(),
            elapsed = ?stats.elapsed,
            "load test finished"
        );

        let mut summary = metrics.snapshot(stats.elapsed);
        let (crossed, total) = thresholds.evaluate(&mut summary);

        let reporter = Reporter::new(config.sli.clone()).with_artifact(&config.output.summary_path);
        let report = reporter.publish(&summary)?;
        println!("{}", formatter(args.format, !args.no_color).format(&report)?);

        if crossed > 0 {
            return Err(AppError::ThresholdsCrossed { crossed, total });
        }
        Ok(())
    }

    fn render_summary(args: ReportArgs) -> Result<(), AppError> {
        let config = match &args.config {
            Some(path) => LoadConfig::from_file(path)?,
            None => LoadConfig::default(),
        };
        let summary = SummaryData::from_file(&args.file)?;

        let report = Reporter::new(config.sli).publish(&summary)?;
        println!("{}", formatter(args.format, !args.no_color).format(&report)?);
        Ok(())
    }
}

fn formatter(format: OutputFormat, colors: bool) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter::new(" ", colors)),
        OutputFormat::Json => Box::new(JsonFormatter::new()),
        OutputFormat::Markdown => Box::new(MarkdownFormatter::new()),
    }
}

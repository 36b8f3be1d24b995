/// Constant-arrival-rate scheduling of workload iterations.
use crate::config::ScenarioConfig;
use crate::runtime::metrics::{MetricsRegistry, DROPPED_ITERATIONS, ITERATIONS, VUS_MAX};
use indicatif::ProgressBar;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};

/// A unit of work the executor starts at a fixed rate.
#[async_trait::async_trait]
pub trait Iteration: Send + Sync + 'static {
    async fn run(&self);
}

/// What happened to the iterations of one scenario.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionStats {
    /// Iterations that got a slot and were spawned.
    pub started: u64,
    /// Iterations skipped because every slot was busy.
    pub dropped: u64,
    /// Iterations that ran to completion.
    pub completed: u64,
    /// Iterations still running when the graceful stop expired.
    pub interrupted: u64,
    /// Iterations that panicked.
    pub panicked: u64,
    /// Highest number of slots allocated at once.
    pub max_slots_used: usize,
    /// Wall-clock time from first start to last reap.
    pub elapsed: Duration,
}

/// Starts iterations at a fixed rate regardless of how long each one takes.
///
/// Every start needs a free slot. When all `max_slots` slots are busy the
/// iteration is dropped and counted in `dropped_iterations`, never queued.
pub struct ArrivalRateExecutor {
    config: ScenarioConfig,
    metrics: Arc<MetricsRegistry>,
}

impl ArrivalRateExecutor {
    pub fn new(config: ScenarioConfig, metrics: Arc<MetricsRegistry>) -> Self {
        Self { config, metrics }
    }

    /// Run the scenario to completion.
    pub async fn run<I: Iteration>(
        &self,
        iteration: Arc<I>,
        progress: Option<Arc<ProgressBar>>,
    ) -> ExecutionStats {
        let mut stats = ExecutionStats::default();
        let period = self.config.period();
        let max_slots = self.config.max_slots.max(1);
        let slots = Arc::new(Semaphore::new(max_slots));
        let mut tasks = JoinSet::new();

        let mut allocated = self.config.pre_allocated.min(max_slots);
        self.metrics.set_gauge(VUS_MAX, allocated as f64);

        tracing::info!(
            rate = self.config.rate,
            time_unit = ?self.config.time_unit,
            duration = ?self.config.duration,
            pre_allocated = self.config.pre_allocated,
            max_slots,
            "starting constant-arrival-rate scenario"
        );

        let start = Instant::now();
        let deadline = tokio::time::sleep_until(start + self.config.duration);
        tokio::pin!(deadline);

        let mut ticker = tokio::time::interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

        loop {
            tokio::select! {
                biased;
                _ = &mut deadline => break,
                _ = ticker.tick() => {
                    let permit = match slots.clone().try_acquire_owned() {
                        Ok(permit) => permit,
                        Err(_) => {
                            if stats.dropped == 0 {
                                tracing::warn!(
                                    max_slots,
                                    "all slots busy, dropping iterations"
                                );
                            }
                            stats.dropped += 1;
                            self.metrics.add_counter(DROPPED_ITERATIONS, None, 1.0);
                            continue;
                        }
                    };

                    let in_use = max_slots - slots.available_permits();
                    if in_use > allocated {
                        allocated = in_use;
                        tracing::debug!(allocated, "allocating additional slot");
                        self.metrics.set_gauge(VUS_MAX, allocated as f64);
                    }

                    stats.started += 1;
                    let iteration = iteration.clone();
                    let metrics = self.metrics.clone();
                    let progress = progress.clone();
                    tasks.spawn(async move {
                        let _permit = permit;
                        iteration.run().await;
                        metrics.add_counter(ITERATIONS, None, 1.0);
                        if let Some(pb) = progress {
                            pb.inc(1);
                        }
                    });
                }
                Some(joined) = tasks.join_next() => reap(&mut stats, joined),
            }
        }

        let in_flight = tasks.len();
        if in_flight > 0 {
            tracing::info!(
                in_flight,
                graceful_stop = ?self.config.graceful_stop,
                "waiting for in-flight iterations"
            );
        }

        let drain = async {
            while let Some(joined) = tasks.join_next().await {
                reap(&mut stats, joined);
            }
        };
        if tokio::time::timeout(self.config.graceful_stop, drain).await.is_err() {
            stats.interrupted = tasks.len() as u64;
            tracing::warn!(
                interrupted = stats.interrupted,
                "graceful stop expired, interrupting iterations"
            );
            tasks.shutdown().await;
        }

        stats.max_slots_used = allocated;
        stats.elapsed = start.elapsed();

        if let Some(pb) = &progress {
            pb.finish_with_message(format!(
                "{} iterations, {} dropped",
                stats.completed, stats.dropped
            ));
        }

        stats
    }
}

fn reap(stats: &mut ExecutionStats, joined: Result<(), tokio::task::JoinError>) {
    match joined {
        Ok(()) => stats.completed += 1,
        Err(e) if e.is_panic() => {
            tracing::error!(error = %e, "iteration panicked");
            stats.panicked += 1;
        }
        Err(_) => {}
    }
}

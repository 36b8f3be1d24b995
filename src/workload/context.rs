/// Run-scoped state shared by every iteration: sequences, randomness, clock.
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonic counters used to build unique team and pull-request names.
#[derive(Debug, Default)]
pub struct Sequences {
    teams: AtomicU64,
    pull_requests: AtomicU64,
}

impl Sequences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next team number, starting at 1.
    pub fn next_team(&self) -> u64 {
        self.teams.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Next pull-request number, starting at 1.
    pub fn next_pull_request(&self) -> u64 {
        self.pull_requests.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn teams_created(&self) -> u64 {
        self.teams.load(Ordering::Relaxed)
    }

    pub fn pull_requests_created(&self) -> u64 {
        self.pull_requests.load(Ordering::Relaxed)
    }
}

/// Source of uniform values in `[0, 1)` for branch decisions.
pub trait RandomSource: Send + Sync {
    fn next_f64(&self) -> f64;
}

/// Unseeded thread-local generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct FastRandom;

impl RandomSource for FastRandom {
    fn next_f64(&self) -> f64 {
        fastrand::f64()
    }
}

/// Replays a fixed sequence, then keeps returning `fallback`.
#[derive(Debug)]
pub struct ScriptedRandom {
    values: Mutex<VecDeque<f64>>,
    fallback: f64,
}

impl ScriptedRandom {
    pub fn new(values: impl IntoIterator<Item = f64>, fallback: f64) -> Self {
        Self {
            values: Mutex::new(values.into_iter().collect()),
            fallback,
        }
    }

    /// Never takes a branch with probability below 1.
    pub fn never() -> Self {
        Self::new([], 0.999_999)
    }

    /// Always takes a branch with non-zero probability.
    pub fn always() -> Self {
        Self::new([], 0.0)
    }
}

impl RandomSource for ScriptedRandom {
    fn next_f64(&self) -> f64 {
        self.values.lock().pop_front().unwrap_or(self.fallback)
    }
}

/// Wall clock used in generated names.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock frozen at a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.0
    }
}

/// Everything an iteration needs besides the client and configuration.
#[derive(Clone)]
pub struct IterationContext {
    pub sequences: Arc<Sequences>,
    pub random: Arc<dyn RandomSource>,
    pub clock: Arc<dyn Clock>,
}

impl IterationContext {
    pub fn new(random: Arc<dyn RandomSource>, clock: Arc<dyn Clock>) -> Self {
        Self {
            sequences: Arc::new(Sequences::new()),
            random,
            clock,
        }
    }

    /// Production context: fresh sequences, `fastrand` and the system clock.
    pub fn system() -> Self {
        Self::new(Arc::new(FastRandom), Arc::new(SystemClock))
    }
}

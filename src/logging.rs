/// Diagnostic logging on stderr.
use indicatif::ProgressBar;
use parking_lot::Mutex;
use std::io::{self, Write};
use tracing_subscriber::EnvFilter;

// Bar currently drawn on stderr, if any.
static ACTIVE_BAR: Mutex<Option<ProgressBar>> = parking_lot::const_mutex(None);

/// Install the global subscriber.
///
/// `level` (from `--log-level`) wins over `RUST_LOG`; without either the
/// filter defaults to `info`. Events go to stderr so stdout carries only the
/// report.
pub fn init(level: Option<&str>) {
    let env_filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    // A subscriber may already be installed when embedded in tests.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(BarAwareStderr::default)
        .try_init();
}

/// Print log lines above `bar` instead of through it until the guard drops.
pub fn attach_progress(bar: &ProgressBar) -> ProgressGuard {
    *ACTIVE_BAR.lock() = Some(bar.clone());
    ProgressGuard { _private: () }
}

/// Detaches the progress bar from logging when dropped.
#[must_use = "the bar is detached as soon as the guard is dropped"]
pub struct ProgressGuard {
    _private: (),
}

impl Drop for ProgressGuard {
    fn drop(&mut self) {
        *ACTIVE_BAR.lock() = None;
    }
}

/// Stderr writer that clears the active progress bar around each event.
#[derive(Debug, Default, Clone, Copy)]
struct BarAwareStderr;

impl BarAwareStderr {
    fn with_bar_suspended<R>(f: impl FnOnce() -> R) -> R {
        let bar = ACTIVE_BAR.lock().clone();
        match bar {
            Some(bar) => bar.suspend(f),
            None => f(),
        }
    }
}

impl Write for BarAwareStderr {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Self::with_bar_suspended(|| io::stderr().write(buf))
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        Self::with_bar_suspended(|| io::stderr().write_all(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

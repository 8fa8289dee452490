//! Live progress line for `generate`.
//!
//! Redraws a single stderr line from the shared [`RunCounters`] at a fixed
//! interval. Silenced with `--no-progress`.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use colored::Colorize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::pipeline::{CounterSnapshot, RunCounters};

/// Redraw interval used by the binary.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(250);

/// Renders run progress to stderr.
pub struct ProgressReporter {
    counters: Arc<RunCounters>,
    total: u64,
    started: Instant,
    /// If false, all output is suppressed.
    enabled: bool,
}

impl ProgressReporter {
    pub fn new(counters: Arc<RunCounters>, total: u64, enabled: bool) -> Self {
        Self {
            counters,
            total,
            started: Instant::now(),
            enabled,
        }
    }

    /// Format one progress line.
    pub fn line(&self, snap: &CounterSnapshot, elapsed: Duration) -> String {
        let percent = if self.total == 0 {
            100.0
        } else {
            snap.generated as f64 * 100.0 / self.total as f64
        };
        let secs = elapsed.as_secs_f64();
        let rate = if secs > 0.0 {
            snap.generated as f64 / secs
        } else {
            0.0
        };
        format!(
            "  {} {}/{} ({:.1}%) {} accepted, {} saved {}",
            "▸".cyan().bold(),
            snap.generated,
            self.total,
            percent,
            snap.accepted.to_string().green(),
            snap.persisted.to_string().bold(),
            format!("· {rate:.0} keys/s").dimmed(),
        )
    }

    /// Redraw the progress line in place.
    pub fn tick(&self) {
        if !self.enabled {
            return;
        }
        let line = self.line(&self.counters.snapshot(), self.started.elapsed());
        let stderr = io::stderr();
        let mut handle = stderr.lock();
        let _ = write!(handle, "\r\x1b[2K{line}");
        let _ = handle.flush();
    }

    /// Draw the final state and move to a fresh line.
    pub fn finish(&self) {
        if !self.enabled {
            return;
        }
        self.tick();
        let _ = writeln!(io::stderr());
    }

    /// Redraw every `interval` until `stop` is cancelled, then finish.
    pub fn spawn(self, interval: Duration, stop: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => self.tick(),
                }
            }
            self.finish();
        })
    }
}

/// Stop a spawned reporter and wait for it. Returns `false` when the task
/// panicked or was aborted.
pub async fn shutdown(task: JoinHandle<()>, stop: &CancellationToken) -> bool {
    stop.cancel();
    match task.await {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(error = %e, "progress reporter ended abnormally");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_shows_progress() {
        colored::control::set_override(false);
        let reporter = ProgressReporter::new(Arc::new(RunCounters::default()), 200, false);
        let snap = CounterSnapshot {
            generated: 50,
            accepted: 3,
            persisted: 2,
            ..CounterSnapshot::default()
        };
        let line = reporter.line(&snap, Duration::from_secs(2));
        assert!(line.contains("50/200 (25.0%)"));
        assert!(line.contains("3 accepted, 2 saved"));
        assert!(line.contains("25 keys/s"));
    }

    #[test]
    fn line_handles_zero_elapsed() {
        colored::control::set_override(false);
        let reporter = ProgressReporter::new(Arc::new(RunCounters::default()), 0, false);
        let line = reporter.line(&CounterSnapshot::default(), Duration::ZERO);
        assert!(line.contains("0/0 (100.0%)"));
        assert!(line.contains("0 keys/s"));
    }

    #[tokio::test]
    async fn disabled_reporter_stops_on_cancel() {
        let stop = CancellationToken::new();
        let handle = ProgressReporter::new(Arc::new(RunCounters::default()), 10, false)
            .spawn(Duration::from_millis(5), stop.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;
        stop.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_reports_clean_and_abnormal_ends() {
        let stop = CancellationToken::new();
        let handle = ProgressReporter::new(Arc::new(RunCounters::default()), 10, false)
            .spawn(Duration::from_millis(5), stop.clone());
        assert!(shutdown(handle, &stop).await);
        assert!(stop.is_cancelled());

        let stop = CancellationToken::new();
        let aborted = tokio::spawn(std::future::pending::<()>());
        aborted.abort();
        assert!(!shutdown(aborted, &stop).await);
    }
}

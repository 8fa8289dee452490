//! Run lifecycle and live counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use strum::Display;

/// Lifecycle of one pipeline run.
///
/// `Idle -> Running -> Draining -> Done`, or `Cancelled` when the
/// cancellation token fires first, or `Failed` when a batch could not be
/// persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    /// All tokens dispatched; workers are finishing what is queued.
    Draining,
    Done,
    Cancelled,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Cancelled | Self::Failed)
    }
}

/// Counters shared by every stage of a run. Updated with relaxed atomics;
/// read through [`RunCounters::snapshot`].
#[derive(Debug, Default)]
pub struct RunCounters {
    pub dispatched: AtomicU64,
    pub generated: AtomicU64,
    pub generation_failures: AtomicU64,
    pub rejected: AtomicU64,
    pub serialization_failures: AtomicU64,
    pub accepted: AtomicU64,
    pub persisted: AtomicU64,
    pub batches_committed: AtomicU64,
}

/// Point-in-time copy of [`RunCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub dispatched: u64,
    pub generated: u64,
    pub generation_failures: u64,
    pub rejected: u64,
    pub serialization_failures: u64,
    pub accepted: u64,
    pub persisted: u64,
    pub batches_committed: u64,
}

impl CounterSnapshot {
    /// Candidates that went through scoring, whatever the outcome.
    pub fn scored(&self) -> u64 {
        self.rejected + self.serialization_failures + self.accepted
    }
}

impl RunCounters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn reset(&self) {
        for counter in self.all() {
            counter.store(0, Ordering::Relaxed);
        }
    }

    fn all(&self) -> [&AtomicU64; 8] {
        [
            &self.dispatched,
            &self.generated,
            &self.generation_failures,
            &self.rejected,
            &self.serialization_failures,
            &self.accepted,
            &self.persisted,
            &self.batches_committed,
        ]
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CounterSnapshot {
            dispatched: load(&self.dispatched),
            generated: load(&self.generated),
            generation_failures: load(&self.generation_failures),
            rejected: load(&self.rejected),
            serialization_failures: load(&self.serialization_failures),
            accepted: load(&self.accepted),
            persisted: load(&self.persisted),
            batches_committed: load(&self.batches_committed),
        }
    }
}

/// Outcome of a run that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub state: RunState,
    pub counts: CounterSnapshot,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

impl RunSummary {
    /// Candidates generated per second over the whole run.
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.counts.generated as f64 / secs
        } else {
            0.0
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!RunState::Idle.is_terminal());
        assert!(!RunState::Draining.is_terminal());
        assert!(RunState::Done.is_terminal());
        assert!(RunState::Cancelled.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert_eq!(RunState::Draining.to_string(), "draining");
    }

    #[test]
    fn snapshot_and_reset() {
        let counters = RunCounters::default();
        RunCounters::bump(&counters.generated);
        RunCounters::add(&counters.persisted, 5);
        RunCounters::bump(&counters.rejected);
        RunCounters::bump(&counters.accepted);
        let snap = counters.snapshot();
        assert_eq!(snap.generated, 1);
        assert_eq!(snap.persisted, 5);
        assert_eq!(snap.scored(), 2);

        counters.reset();
        assert_eq!(counters.snapshot(), CounterSnapshot::default());
    }

    #[test]
    fn summary_rate() {
        let summary = RunSummary {
            state: RunState::Done,
            counts: CounterSnapshot {
                generated: 500,
                ..CounterSnapshot::default()
            },
            elapsed: Duration::from_secs(2),
        };
        assert_eq!(summary.rate(), 250.0);
        let json = serde_json::to_value(summary).unwrap();
        assert_eq!(json["state"], "done");
        assert_eq!(json["elapsed"], 2.0);
    }
}

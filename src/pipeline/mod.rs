//! Generate, score and save pipeline.
//!
//! One run wires three stages together with bounded channels:
//!
//! ```text
//! dispatcher --tokens--> generators --candidates--> scorers --records--> saver
//! ```
//!
//! The dispatcher sends exactly `total_keys` tokens and then closes its
//! channel. Every stage exits once its input is closed and drained, which
//! closes the next channel in turn, so shutdown always runs front to back.
//! A [`CancellationToken`] is checked at every channel operation; the saver
//! commits or rolls back whatever batch it holds before it returns.

pub mod pool;
pub mod state;
mod stages;

pub use pool::RecordPool;
pub use state::{CounterSnapshot, RunCounters, RunState, RunSummary};

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::entity::EntityFactory;
use crate::repository::{KeyRepository, RepositoryError};
use crate::scoring::{AcceptancePolicy, PolicyError, ScoreTables};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid acceptance policy: {0}")]
    Policy(#[from] PolicyError),

    #[error("failed to persist batch: {0}")]
    Repository(#[from] RepositoryError),

    #[error("{stage} worker panicked: {message}")]
    WorkerPanicked { stage: &'static str, message: String },
}

/// Knobs for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Candidates to attempt. Rejected or failed candidates are not replaced.
    pub total_keys: u64,
    pub generator_workers: usize,
    pub scorer_workers: usize,
    /// Records per transaction.
    pub batch_size: usize,
    /// Channel slots per worker of the receiving stage.
    pub queue_depth: usize,
    pub policy: AcceptancePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            total_keys: 100_000,
            generator_workers: workers,
            scorer_workers: workers,
            batch_size: 100,
            queue_depth: 20,
            policy: AcceptancePolicy::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        let zero = [
            ("total_keys", self.total_keys == 0),
            ("generator_workers", self.generator_workers == 0),
            ("scorer_workers", self.scorer_workers == 0),
            ("batch_size", self.batch_size == 0),
            ("queue_depth", self.queue_depth == 0),
        ];
        if let Some((name, _)) = zero.iter().find(|(_, is_zero)| *is_zero) {
            return Err(PipelineError::InvalidConfig(format!(
                "{name} must be greater than zero"
            )));
        }
        Ok(self.policy.validate()?)
    }

    fn token_capacity(&self) -> usize {
        self.generator_workers.saturating_mul(self.queue_depth)
    }

    fn candidate_capacity(&self) -> usize {
        self.scorer_workers.saturating_mul(self.queue_depth)
    }

    fn record_capacity(&self) -> usize {
        self.batch_size.max(self.queue_depth)
    }
}

/// A configured miner. Runs one pipeline at a time.
pub struct Pipeline {
    config: PipelineConfig,
    factory: Arc<EntityFactory>,
    tables: Arc<ScoreTables>,
    counters: Arc<RunCounters>,
    pool: Arc<RecordPool>,
    state: watch::Sender<RunState>,
}

impl Pipeline {
    /// Validates `config`; nothing is spawned until [`Pipeline::run`].
    pub fn new(
        config: PipelineConfig,
        factory: EntityFactory,
        tables: Arc<ScoreTables>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let pool = RecordPool::new(config.batch_size + config.record_capacity());
        let (state, _) = watch::channel(RunState::Idle);
        Ok(Self {
            config,
            factory: Arc::new(factory),
            tables,
            counters: Arc::new(RunCounters::default()),
            pool: Arc::new(pool),
            state,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Watch the run state.
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    /// Live counters of the current (or last) run.
    pub fn counters(&self) -> Arc<RunCounters> {
        Arc::clone(&self.counters)
    }

    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    /// Run the pipeline to completion, cancellation or failure.
    ///
    /// `repository` is moved onto the saver's blocking thread and dropped
    /// when the run ends. Cancelling `cancel` stops the run cooperatively;
    /// the result is then a summary in state [`RunState::Cancelled`].
    pub async fn run<R>(
        &mut self,
        repository: R,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, PipelineError>
    where
        R: KeyRepository + 'static,
    {
        let started = Instant::now();
        // failures inside the run cancel only this child, never the caller's token
        let token = cancel.child_token();
        self.counters.reset();
        self.state.send_replace(RunState::Running);
        tracing::info!(
            total = self.config.total_keys,
            generators = self.config.generator_workers,
            scorers = self.config.scorer_workers,
            batch_size = self.config.batch_size,
            policy = %self.config.policy.describe(),
            encrypting = self.factory.is_encrypting(),
            "pipeline started"
        );

        let (token_tx, token_rx) = mpsc::channel::<u64>(self.config.token_capacity());
        let (candidate_tx, candidate_rx) = mpsc::channel(self.config.candidate_capacity());
        let (record_tx, record_rx) = mpsc::channel(self.config.record_capacity());
        let token_rx = Arc::new(Mutex::new(token_rx));
        let candidate_rx = Arc::new(Mutex::new(candidate_rx));

        let saver = {
            let saver = stages::Saver {
                batch_size: self.config.batch_size,
                pool: Arc::clone(&self.pool),
                counters: Arc::clone(&self.counters),
                cancel: token.clone(),
            };
            tokio::task::spawn_blocking(move || saver.run(repository, record_rx))
        };

        let mut scorers = JoinSet::new();
        for id in 0..self.config.scorer_workers {
            let scorer = stages::Scorer {
                id,
                factory: Arc::clone(&self.factory),
                tables: Arc::clone(&self.tables),
                policy: self.config.policy,
                pool: Arc::clone(&self.pool),
                counters: Arc::clone(&self.counters),
                cancel: token.clone(),
            };
            scorers.spawn(scorer.run(Arc::clone(&candidate_rx), record_tx.clone()));
        }
        drop(record_tx);
        drop(candidate_rx);

        let mut generators = JoinSet::new();
        for id in 0..self.config.generator_workers {
            let generator = stages::Generator {
                id,
                factory: Arc::clone(&self.factory),
                counters: Arc::clone(&self.counters),
                cancel: token.clone(),
            };
            generators.spawn(generator.run(Arc::clone(&token_rx), candidate_tx.clone()));
        }
        drop(candidate_tx);
        drop(token_rx);

        stages::dispatch(self.config.total_keys, token_tx, &self.counters, &token).await;
        if !token.is_cancelled() {
            self.state.send_replace(RunState::Draining);
            tracing::debug!("all tokens dispatched, draining");
        }

        let mut panic = join_all(&mut generators, "generator", &token).await;
        panic = panic.or(join_all(&mut scorers, "scorer", &token).await);
        let saved = match saver.await {
            Ok(result) => result,
            Err(e) => Err(panicked("saver", e)),
        };

        let counts = self.counters.snapshot();
        let outcome = match (saved, panic) {
            (Err(e), _) | (Ok(()), Some(e)) => Err(e),
            (Ok(()), None) => Ok(()),
        };
        if let Err(e) = outcome {
            self.state.send_replace(RunState::Failed);
            tracing::error!(error = %e, persisted = counts.persisted, "pipeline failed");
            return Err(e);
        }

        let state = if token.is_cancelled() {
            RunState::Cancelled
        } else {
            RunState::Done
        };
        self.state.send_replace(state);
        let summary = RunSummary {
            state,
            counts,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            state = %state,
            generated = counts.generated,
            accepted = counts.accepted,
            persisted = counts.persisted,
            batches = counts.batches_committed,
            elapsed_secs = summary.elapsed.as_secs_f64(),
            "pipeline finished"
        );
        Ok(summary)
    }
}

/// Wait for every task in `set`; report the first panic, if any. A panic
/// cancels the run so the remaining stages cannot block on it.
async fn join_all(
    set: &mut JoinSet<()>,
    stage: &'static str,
    token: &CancellationToken,
) -> Option<PipelineError> {
    let mut first = None;
    while let Some(joined) = set.join_next().await {
        if let Err(e) = joined {
            let err = panicked(stage, e);
            tracing::error!(error = %err, "worker ended abnormally");
            token.cancel();
            first.get_or_insert(err);
        }
    }
    first
}

fn panicked(stage: &'static str, err: JoinError) -> PipelineError {
    let message = if err.is_panic() {
        let payload = err.into_panic();
        payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string())
    } else {
        err.to_string()
    };
    PipelineError::WorkerPanicked { stage, message }
}

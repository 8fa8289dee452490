//! The workers behind each pipeline stage.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use super::PipelineError;
use super::pool::RecordPool;
use super::state::RunCounters;
use crate::entity::{Candidate, EntityFactory, fingerprint};
use crate::models::KeyRecord;
use crate::repository::KeyRepository;
use crate::scoring::{AcceptancePolicy, ScoreTables};

/// Receiver shared by all workers of one stage.
pub(super) type SharedReceiver<T> = Arc<Mutex<mpsc::Receiver<T>>>;

/// Take the next item, or `None` once the channel is drained or the run is
/// cancelled.
async fn next<T>(rx: &SharedReceiver<T>, cancel: &CancellationToken) -> Option<T> {
    let mut rx = rx.lock().await;
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        item = rx.recv() => item,
    }
}

/// Send downstream. `false` when the run was cancelled or the receiver is gone.
async fn forward<T>(tx: &mpsc::Sender<T>, item: T, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = tx.send(item) => sent.is_ok(),
    }
}

/// Feed `total` generation tokens, then close the channel by dropping it.
pub(super) async fn dispatch(
    total: u64,
    tx: mpsc::Sender<u64>,
    counters: &RunCounters,
    cancel: &CancellationToken,
) {
    for seq in 0..total {
        if !forward(&tx, seq, cancel).await {
            tracing::debug!(dispatched = seq, "dispatch stopped early");
            return;
        }
        RunCounters::bump(&counters.dispatched);
    }
}

pub(super) struct Generator {
    pub id: usize,
    pub factory: Arc<EntityFactory>,
    pub counters: Arc<RunCounters>,
    pub cancel: CancellationToken,
}

impl Generator {
    pub async fn run(self, tokens: SharedReceiver<u64>, out: mpsc::Sender<Candidate>) {
        tracing::debug!(worker = self.id, "generator started");
        while next(&tokens, &self.cancel).await.is_some() {
            let candidate = match self.factory.new_candidate() {
                Ok(candidate) => candidate,
                Err(e) => {
                    RunCounters::bump(&self.counters.generation_failures);
                    tracing::warn!(worker = self.id, error = %e, "key generation failed, skipping");
                    continue;
                }
            };
            RunCounters::bump(&self.counters.generated);
            if !forward(&out, candidate, &self.cancel).await {
                break;
            }
        }
        tracing::debug!(
            worker = self.id,
            cancelled = self.cancel.is_cancelled(),
            "generator finished"
        );
    }
}

pub(super) struct Scorer {
    pub id: usize,
    pub factory: Arc<EntityFactory>,
    pub tables: Arc<ScoreTables>,
    pub policy: AcceptancePolicy,
    pub pool: Arc<RecordPool>,
    pub counters: Arc<RunCounters>,
    pub cancel: CancellationToken,
}

impl Scorer {
    pub async fn run(self, candidates: SharedReceiver<Candidate>, out: mpsc::Sender<KeyRecord>) {
        tracing::debug!(worker = self.id, "scorer started");
        while let Some(candidate) = next(&candidates, &self.cancel).await {
            let Some(record) = self.evaluate(&candidate) else {
                continue;
            };
            if !forward(&out, record, &self.cancel).await {
                break;
            }
        }
        tracing::debug!(
            worker = self.id,
            cancelled = self.cancel.is_cancelled(),
            "scorer finished"
        );
    }

    /// Score, filter and serialize one candidate. `None` means dropped.
    fn evaluate(&self, candidate: &Candidate) -> Option<KeyRecord> {
        let fp = candidate.fingerprint();
        let score = self.tables.calculate_score(fingerprint::scored_suffix(&fp));
        if !self.policy.accepts(&score) {
            RunCounters::bump(&self.counters.rejected);
            return None;
        }

        let armored = match self.factory.serialize(candidate) {
            Ok(armored) => armored,
            Err(e) => {
                RunCounters::bump(&self.counters.serialization_failures);
                tracing::warn!(worker = self.id, fingerprint = %fp, error = %e, "serialization failed, dropping candidate");
                return None;
            }
        };

        let mut record = self.pool.checkout();
        record.fill(&fp, &armored.public_key, &armored.private_key, &score);
        RunCounters::bump(&self.counters.accepted);
        tracing::debug!(
            worker = self.id,
            fingerprint = %fp,
            score = record.score,
            unique = record.unique_digit_count,
            "candidate accepted"
        );
        Some(record)
    }
}

/// The single owner of the repository during a run.
pub(super) struct Saver {
    pub batch_size: usize,
    pub pool: Arc<RecordPool>,
    pub counters: Arc<RunCounters>,
    pub cancel: CancellationToken,
}

impl Saver {
    /// Blocking loop; runs on its own thread. On failure the run is
    /// cancelled so upstream workers stop.
    pub fn run<R: KeyRepository>(
        self,
        mut repository: R,
        mut records: mpsc::Receiver<KeyRecord>,
    ) -> Result<(), PipelineError> {
        tracing::debug!(batch_size = self.batch_size, "saver started");
        let result = self.drain(&mut repository, &mut records);
        if let Err(e) = &result {
            tracing::error!(error = %e, "saver stopping after failed batch");
            self.cancel.cancel();
        }
        tracing::debug!("saver finished");
        result
    }

    fn drain(
        &self,
        repository: &mut dyn KeyRepository,
        records: &mut mpsc::Receiver<KeyRecord>,
    ) -> Result<(), PipelineError> {
        let mut batch = Vec::with_capacity(self.batch_size);
        while let Some(record) = records.blocking_recv() {
            batch.push(record);
            if batch.len() >= self.batch_size {
                self.flush(repository, &mut batch)?;
            }
            if self.cancel.is_cancelled() {
                break;
            }
        }
        if !batch.is_empty() {
            tracing::debug!(records = batch.len(), "flushing final partial batch");
            self.flush(repository, &mut batch)?;
        }
        Ok(())
    }

    /// Persist `batch` in one transaction, then recycle its records.
    fn flush(
        &self,
        repository: &mut dyn KeyRepository,
        batch: &mut Vec<KeyRecord>,
    ) -> Result<(), PipelineError> {
        let mut tx = repository.begin_transaction()?;
        match tx.batch_insert(batch) {
            Ok(_) => tx.commit()?,
            Err(e) => {
                if let Err(rollback) = tx.rollback() {
                    tracing::error!(error = %rollback, "rollback failed");
                }
                return Err(e.into());
            }
        }

        let size = batch.len() as u64;
        RunCounters::add(&self.counters.persisted, size);
        RunCounters::bump(&self.counters.batches_committed);
        tracing::info!(
            records = size,
            total = self.counters.persisted.load(std::sync::atomic::Ordering::Relaxed),
            "batch committed"
        );
        for record in batch.drain(..) {
            self.pool.recycle(record);
        }
        Ok(())
    }
}

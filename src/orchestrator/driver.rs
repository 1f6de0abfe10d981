use std::collections::HashSet;
use std::sync::Arc;

use bon::Builder;
use futures::stream::{self, StreamExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::summary::RunSummary;
use super::worker::{ItemOutcome, ItemWorker};
use super::OrchestratorError;
use crate::config::Config;
use crate::fetch::{Fetcher, PayloadSink};
use crate::item::ItemId;
use crate::ledger::{LedgerError, LedgerStore};
use crate::limiter::RateLimiter;
use crate::observability::RunMetrics;
use crate::retry::RetryPolicy;

/// Batch driver over the two ledgers
///
/// ```rust,ignore
/// let orchestrator = FetchOrchestrator::builder()
///     .store(store)
///     .limiter(config.rate_limiter())
///     .retry(config.retry_policy())
///     .build();
/// let summary = orchestrator.run(universe, &fetcher, &sink, &cancel).await?;
/// ```
#[derive(Builder)]
pub struct FetchOrchestrator {
    store: LedgerStore,
    #[builder(default, into)]
    limiter: Arc<RateLimiter>,
    #[builder(default)]
    retry: RetryPolicy,
    #[builder(default = 2)]
    worker_pool_size: usize,
    /// Log progress every N finished items (0 disables)
    #[builder(default = 100)]
    progress_every: usize,
}

impl FetchOrchestrator {
    pub fn from_config(store: LedgerStore, config: &Config) -> Self {
        Self::builder()
            .store(store)
            .limiter(config.rate_limiter())
            .retry(config.retry_policy())
            .worker_pool_size(config.orchestrator.worker_pool_size)
            .progress_every(config.orchestrator.progress_every)
            .build()
    }

    /// Fetch every pending item of `universe` and record the outcomes
    ///
    /// Items already done are skipped, quarantined items are left alone.
    /// Cancelling `cancel` stops new items and retries from starting; the
    /// attempt in flight still records its outcome. A ledger failure halts
    /// the run and comes back as [`OrchestratorError::Ledger`] carrying the
    /// partial summary.
    pub async fn run<I, F, S>(
        &self,
        universe: I,
        fetcher: &F,
        sink: &S,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, OrchestratorError>
    where
        I: IntoIterator<Item = ItemId>,
        F: Fetcher,
        S: PayloadSink<F::Payload>,
    {
        let started = Instant::now();
        let mut summary = RunSummary::new(Uuid::now_v7(), fetcher.provider());

        let universe: Vec<ItemId> = universe.into_iter().collect();
        if universe.is_empty() {
            info!(run_id = %summary.run_id, provider = %summary.provider, "Empty universe, nothing to do");
            return Ok(summary);
        }

        let work = match self.plan(universe, &mut summary) {
            Ok(work) => work,
            Err(source) => {
                summary.elapsed = started.elapsed();
                return Err(OrchestratorError::ledger(summary, source));
            }
        };

        info!(
            run_id = %summary.run_id,
            provider = %summary.provider,
            universe = summary.universe,
            pending = work.len(),
            skipped = summary.skipped,
            skipped_quarantined = summary.skipped_quarantined,
            workers = self.worker_pool_size,
            "Run starting"
        );

        let metrics = RunMetrics::new();
        let halt = cancel.child_token();
        let worker = ItemWorker {
            store: &self.store,
            limiter: &self.limiter,
            retry: &self.retry,
            fetcher,
            sink,
            metrics: &metrics,
            halt: &halt,
        };

        let total = work.len();
        let mut finished = 0usize;
        let mut ledger_error: Option<LedgerError> = None;

        let mut outcomes = stream::iter(work)
            .map(|id| worker.process(id))
            .buffer_unordered(self.worker_pool_size.max(1));

        while let Some(outcome) = outcomes.next().await {
            match outcome {
                Ok(ItemOutcome::NotStarted) => {}
                Ok(_) => {
                    finished += 1;
                    if self.progress_every > 0 && finished % self.progress_every == 0 {
                        let snapshot = metrics.snapshot();
                        info!(
                            run_id = %summary.run_id,
                            finished,
                            total,
                            succeeded = snapshot.succeeded,
                            quarantined = snapshot.quarantined,
                            "Progress"
                        );
                    }
                }
                Err(e) => {
                    error!(run_id = %summary.run_id, error = %e, "Ledger write failed, halting run");
                    ledger_error.get_or_insert(e);
                    halt.cancel();
                }
            }
        }
        drop(outcomes);

        if let Err(e) = self.store.persist() {
            error!(run_id = %summary.run_id, error = %e, "Failed to persist ledgers");
            ledger_error.get_or_insert(e);
        }

        summary.apply(metrics.snapshot());
        summary.cancelled = cancel.is_cancelled();
        summary.elapsed = started.elapsed();

        if let Some(source) = ledger_error {
            return Err(OrchestratorError::ledger(summary, source));
        }

        summary.log();
        if summary.quarantined > 0 {
            warn!(
                run_id = %summary.run_id,
                quarantined = summary.quarantined,
                ledger = %self.store.path().display(),
                "Items quarantined this run; list them with `fetchledger quarantined`"
            );
        }
        if summary.cancelled {
            warn!(
                run_id = %summary.run_id,
                unfinished = summary.unfinished(),
                "Run cancelled; remaining items stay pending for the next run"
            );
        }

        Ok(summary)
    }

    /// Split the universe into work, done items and quarantined items
    fn plan(
        &self,
        universe: Vec<ItemId>,
        summary: &mut RunSummary,
    ) -> Result<Vec<ItemId>, LedgerError> {
        let distinct = universe.iter().collect::<HashSet<_>>().len();
        let pending = self.store.status().pending_subset(universe)?;

        let mut work = Vec::with_capacity(pending.len());
        let mut skipped_quarantined = 0u64;
        for id in pending {
            if self.store.failures().is_quarantined(&id)? {
                debug!(item_id = %id, "Skipping quarantined item");
                skipped_quarantined += 1;
            } else {
                work.push(id);
            }
        }

        summary.universe = distinct as u64;
        summary.skipped_quarantined = skipped_quarantined;
        summary.skipped = distinct as u64 - work.len() as u64 - skipped_quarantined;
        Ok(work)
    }
}

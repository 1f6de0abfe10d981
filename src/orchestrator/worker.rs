//! Driving a single item to an outcome

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::fetch::{FetchError, Fetcher, PayloadSink};
use crate::item::ItemId;
use crate::ledger::{LedgerStore, Result};
use crate::limiter::RateLimiter;
use crate::observability::RunMetrics;
use crate::retry::{RetryDecision, RetryPolicy};

/// Where one item ended up in this run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ItemOutcome {
    /// Cancelled before its first attempt; the ledger was not touched
    NotStarted,
    Succeeded { attempts: u32 },
    Quarantined { attempts: u32 },
    /// Cancelled while waiting to retry; left `Failed`, eligible next run
    Interrupted { attempts: u32 },
}

/// Everything an item needs, shared by all workers of one run
pub(crate) struct ItemWorker<'a, F, S> {
    pub store: &'a LedgerStore,
    pub limiter: &'a RateLimiter,
    pub retry: &'a RetryPolicy,
    pub fetcher: &'a F,
    pub sink: &'a S,
    pub metrics: &'a RunMetrics,
    pub halt: &'a CancellationToken,
}

impl<F, S> ItemWorker<'_, F, S>
where
    F: Fetcher,
    S: PayloadSink<F::Payload>,
{
    /// Attempt `id` until it succeeds, gets quarantined or the run halts.
    /// Ledger errors abort the item and are returned to the driver.
    pub async fn process(&self, id: ItemId) -> Result<ItemOutcome> {
        let provider = self.fetcher.provider();
        let status = self.store.status();
        let mut attempt: u32 = 0;

        loop {
            let acquired = tokio::select! {
                biased;
                _ = self.halt.cancelled() => false,
                _ = self.limiter.acquire(provider) => true,
            };
            if !acquired {
                return Ok(self.interrupted(&id, attempt));
            }

            attempt += 1;
            let record = status.mark_attempt(&id)?;
            if attempt == 1 {
                self.metrics.item_attempted();
            } else {
                self.metrics.attempt_retried();
            }
            debug!(item_id = %id, provider, attempt, "Attempting item");

            let error = match self.attempt(&id).await {
                Ok(()) => {
                    status.mark_success(&id)?;
                    self.metrics.item_succeeded();
                    debug!(item_id = %id, provider, attempt, "Item succeeded");
                    return Ok(ItemOutcome::Succeeded { attempts: attempt });
                }
                Err(error) => error,
            };

            if error.is_rate_limited() {
                let cooldown = error
                    .retry_after()
                    .unwrap_or_else(|| self.retry.next_delay(attempt));
                self.limiter.penalize(provider, cooldown);
            }

            match self.retry.decide(attempt, &error) {
                RetryDecision::Quarantine { cause } => {
                    self.store
                        .failures()
                        .quarantine(&id, provider, cause, record.attempt_count)?;
                    status.mark_failed(&id)?;
                    self.metrics.item_quarantined();
                    return Ok(ItemOutcome::Quarantined { attempts: attempt });
                }
                RetryDecision::Retry { delay } => {
                    status.mark_failed(&id)?;
                    warn!(
                        item_id = %id,
                        provider,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Attempt failed, backing off"
                    );
                    if !self.backoff(delay).await {
                        return Ok(self.interrupted(&id, attempt));
                    }
                }
            }
        }
    }

    /// One fetch plus hand-off to the sink
    async fn attempt(&self, id: &ItemId) -> std::result::Result<(), FetchError> {
        let payload = self.fetcher.fetch(id).await?;
        self.sink.store(id, payload).await?;
        Ok(())
    }

    /// Sleep for `delay`; false if the run halted first
    async fn backoff(&self, delay: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.halt.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    fn interrupted(&self, id: &ItemId, attempts: u32) -> ItemOutcome {
        if attempts == 0 {
            return ItemOutcome::NotStarted;
        }
        self.metrics.item_interrupted();
        debug!(item_id = %id, attempts, "Item interrupted by cancellation");
        ItemOutcome::Interrupted { attempts }
    }
}

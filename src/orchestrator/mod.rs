//! Resumable batch fetching
//!
//! A run takes a universe of ids, asks the status ledger which of them are
//! still pending, drops the quarantined ones and pushes the rest through a
//! bounded worker pool. Each item goes
//!
//! ```text
//! acquire slot -> mark_attempt -> fetch -> sink -> mark_success
//!                                   \-> classify -> backoff and retry
//!                                               \-> quarantine + mark_failed
//! ```
//!
//! Every ledger write is durable before the next step, so a crash or a
//! cancelled run leaves each item either done, failed (picked up again next
//! run) or quarantined.

mod driver;
mod summary;
mod worker;

pub use driver::FetchOrchestrator;
pub use summary::RunSummary;

use thiserror::Error;

use crate::ledger::LedgerError;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Ledger failure halted the run: {source}")]
    Ledger {
        summary: Box<RunSummary>,
        #[source]
        source: LedgerError,
    },
}

impl OrchestratorError {
    pub(crate) fn ledger(summary: RunSummary, source: LedgerError) -> Self {
        OrchestratorError::Ledger {
            summary: Box::new(summary),
            source,
        }
    }

    /// What the run got done before it halted
    pub fn summary(&self) -> &RunSummary {
        match self {
            OrchestratorError::Ledger { summary, .. } => summary,
        }
    }
}

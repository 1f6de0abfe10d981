/// Fjall-based ledgers for resumable fetching
///
/// Two partitions in one embedded keyspace:
///
/// - `status`: per-item fetch state (pending / success / failed), attempt
///   count and timestamps. Decides what the next run still has to do.
/// - `failures`: quarantined items with their cause, waiting for an
///   operator to release them.
///
/// Every record update is synced on its own; nothing is batched across
/// items, so a crash loses at most the attempt that was in flight.
///
/// ## Usage
///
/// ```rust,ignore
/// use fetchledger::ledger::LedgerStore;
///
/// let store = LedgerStore::open("data/ledger")?;
/// let pending = store.status().pending_subset(universe)?;
/// store.status().mark_success(&id)?;
/// ```

pub mod error;
pub mod failures;
pub mod partitions;
pub mod status;
pub mod store;

pub use error::{LedgerError, Result};
pub use failures::{FailureCause, FailureCauseKind, FailureLedger, FailureRecord};
pub use status::{ItemState, StatusLedger, StatusRecord, StatusStats};
pub use store::{LedgerStore, StoreStats};

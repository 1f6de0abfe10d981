use std::path::{Path, PathBuf};
use std::time::Duration;

use fjall::{Config, Keyspace, PartitionCreateOptions};
use serde::Serialize;
use tracing::info;

use crate::clock::{self, SharedClock};

use super::error::Result;
use super::failures::FailureLedger;
use super::partitions::{FAILURES_PARTITION, STATUS_PARTITION};
use super::status::{StatusLedger, StatusStats};

/// Fjall keyspace holding both ledgers
///
/// Each ledger owns its own partition; the store only opens them and
/// flushes the shared journal.
#[derive(Clone)]
pub struct LedgerStore {
    path: PathBuf,
    keyspace: Keyspace,
    status: StatusLedger,
    failures: FailureLedger,
}

impl LedgerStore {
    /// Open or create a ledger store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_clock(path, clock::system())
    }

    /// Open with an explicit clock for record timestamps
    pub fn open_with_clock<P: AsRef<Path>>(path: P, clock: SharedClock) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening ledger store at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let status = keyspace.open_partition(STATUS_PARTITION, PartitionCreateOptions::default())?;
        let failures =
            keyspace.open_partition(FAILURES_PARTITION, PartitionCreateOptions::default())?;

        info!("Ledger store opened successfully");
        Ok(Self {
            path: path.to_path_buf(),
            status: StatusLedger::new(keyspace.clone(), status, clock.clone()),
            failures: FailureLedger::new(keyspace.clone(), failures, clock),
            keyspace,
        })
    }

    /// Apply a refresh window to the status ledger
    pub fn with_refresh_after(mut self, window: Option<Duration>) -> Self {
        self.status = self.status.with_refresh_after(window);
        self
    }

    pub fn status(&self) -> &StatusLedger {
        &self.status
    }

    pub fn failures(&self) -> &FailureLedger {
        &self.failures
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }

    /// Snapshot of both ledgers (for the `status` command)
    pub fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats {
            status: self.status.stats()?,
            quarantined: self.failures.count()?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub status: StatusStats,
    pub quarantined: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemId;
    use crate::ledger::FailureCause;
    use tempfile::TempDir;

    #[test]
    fn test_open_store() {
        let temp_dir = TempDir::new().unwrap();
        let store = LedgerStore::open(temp_dir.path().join("nested").join("ledger"));
        assert!(store.is_ok());
    }

    #[test]
    fn test_stats_cover_both_ledgers() {
        let temp_dir = TempDir::new().unwrap();
        let store = LedgerStore::open(temp_dir.path().join("ledger")).unwrap();

        store.status().mark_success(&ItemId::from(1u64)).unwrap();
        store.status().mark_failed(&ItemId::from(2u64)).unwrap();
        store
            .failures()
            .quarantine(&ItemId::from(2u64), "steam", FailureCause::permanent("gone"), 1)
            .unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.status.total, 2);
        assert_eq!(stats.status.success, 1);
        assert_eq!(stats.quarantined, 1);
    }

    #[test]
    fn test_persist() {
        let temp_dir = TempDir::new().unwrap();
        let store = LedgerStore::open(temp_dir.path().join("ledger")).unwrap();
        store.status().mark_attempt(&ItemId::from(1u64)).unwrap();

        store.persist().unwrap();
    }
}

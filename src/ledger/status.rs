use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use fjall::{Keyspace, PartitionHandle, PersistMode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::SharedClock;
use crate::item::ItemId;

use super::error::Result;
use super::partitions::{decode_status_key, encode_status_key};

/// Fetch state of a single item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemState {
    Pending,
    Success,
    Failed,
}

/// Per-item status record
///
/// `attempt_count` never decreases, and a `Success` record always has
/// `last_success_at` set and at least one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub state: ItemState,
    pub last_attempt_at: DateTime<Utc>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub attempt_count: u32,
}

impl StatusRecord {
    fn first_seen(now: DateTime<Utc>) -> Self {
        Self {
            state: ItemState::Pending,
            last_attempt_at: now,
            last_success_at: None,
            attempt_count: 0,
        }
    }
}

/// Counts per state across the whole ledger
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusStats {
    pub total: usize,
    pub pending: usize,
    pub success: usize,
    pub failed: usize,
    /// Successes older than the refresh window
    pub stale: usize,
}

/// Durable item status ledger
///
/// Every update is written and synced before the call returns, so a
/// success recorded right before a crash survives the restart.
#[derive(Clone)]
pub struct StatusLedger {
    keyspace: Keyspace,
    partition: PartitionHandle,
    clock: SharedClock,
    refresh_after: Option<Duration>,
    write_lock: Arc<Mutex<()>>,
}

impl StatusLedger {
    pub(crate) fn new(keyspace: Keyspace, partition: PartitionHandle, clock: SharedClock) -> Self {
        Self {
            keyspace,
            partition,
            clock,
            refresh_after: None,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Treat successes older than `window` as due for a re-fetch
    pub fn with_refresh_after(mut self, window: Option<Duration>) -> Self {
        self.refresh_after = window.filter(|w| !w.is_zero());
        self
    }

    /// Get the record for an item, `None` if it was never attempted
    pub fn get(&self, id: &ItemId) -> Result<Option<StatusRecord>> {
        match self.partition.get(encode_status_key(id))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    /// True iff the item succeeded and the success has not gone stale
    pub fn is_done(&self, id: &ItemId) -> Result<bool> {
        let now = self.clock.now();
        Ok(self
            .get(id)?
            .is_some_and(|record| self.counts_as_done(&record, now)))
    }

    /// Record the start of an attempt
    pub fn mark_attempt(&self, id: &ItemId) -> Result<StatusRecord> {
        self.update(id, |record, now| {
            record.attempt_count = record.attempt_count.saturating_add(1);
            record.last_attempt_at = now;
            if record.state != ItemState::Success {
                record.state = ItemState::Pending;
            }
        })
    }

    pub fn mark_success(&self, id: &ItemId) -> Result<StatusRecord> {
        self.update(id, |record, now| {
            record.state = ItemState::Success;
            record.last_success_at = Some(now);
            if record.attempt_count == 0 {
                record.attempt_count = 1;
                record.last_attempt_at = now;
            }
        })
    }

    /// Record a transient failure. Permanent failures additionally live
    /// in the failure ledger.
    pub fn mark_failed(&self, id: &ItemId) -> Result<StatusRecord> {
        self.update(id, |record, now| {
            record.state = ItemState::Failed;
            if record.attempt_count == 0 {
                record.attempt_count = 1;
                record.last_attempt_at = now;
            }
        })
    }

    /// Put an item back to pending (operator re-queue). Attempt history is kept.
    pub fn reset(&self, id: &ItemId) -> Result<Option<StatusRecord>> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let Some(mut record) = self.get(id)? else {
            return Ok(None);
        };
        record.state = ItemState::Pending;
        self.write(id, &record)?;
        debug!(item_id = %id, "Status reset to pending");
        Ok(Some(record))
    }

    /// Every id in `universe` that still needs work, deduplicated, in
    /// first-seen order
    pub fn pending_subset<I>(&self, universe: I) -> Result<Vec<ItemId>>
    where
        I: IntoIterator<Item = ItemId>,
    {
        let now = self.clock.now();
        let mut seen = HashSet::new();
        let mut pending = Vec::new();

        for id in universe {
            if !seen.insert(id.clone()) {
                continue;
            }
            let done = self
                .get(&id)?
                .is_some_and(|record| self.counts_as_done(&record, now));
            if !done {
                pending.push(id);
            }
        }

        Ok(pending)
    }

    /// Scan the ledger and count records per state
    pub fn stats(&self) -> Result<StatusStats> {
        let now = self.clock.now();
        let mut stats = StatusStats::default();

        for item in self.partition.iter() {
            let (key, value) = item?;
            let record: StatusRecord = match serde_json::from_slice(&value) {
                Ok(record) => record,
                Err(e) => {
                    warn!(key = %String::from_utf8_lossy(&key), error = %e, "Unreadable status record");
                    return Err(e.into());
                }
            };

            stats.total += 1;
            match record.state {
                ItemState::Pending => stats.pending += 1,
                ItemState::Failed => stats.failed += 1,
                ItemState::Success => {
                    stats.success += 1;
                    if !self.counts_as_done(&record, now) {
                        stats.stale += 1;
                    }
                }
            }
        }

        Ok(stats)
    }

    /// All records, in key order
    pub fn records(&self) -> Result<Vec<(ItemId, StatusRecord)>> {
        let mut records = Vec::new();
        for item in self.partition.iter() {
            let (key, value) = item?;
            let id = decode_status_key(&key).ok_or_else(|| {
                super::LedgerError::InvalidKey(String::from_utf8_lossy(&key).to_string())
            })?;
            records.push((id, serde_json::from_slice(&value)?));
        }
        Ok(records)
    }

    fn counts_as_done(&self, record: &StatusRecord, now: DateTime<Utc>) -> bool {
        if record.state != ItemState::Success {
            return false;
        }
        match (self.refresh_after, record.last_success_at) {
            (Some(window), Some(at)) => match chrono::Duration::from_std(window) {
                Ok(window) => now - at < window,
                Err(_) => true,
            },
            _ => true,
        }
    }

    fn update<F>(&self, id: &ItemId, apply: F) -> Result<StatusRecord>
    where
        F: FnOnce(&mut StatusRecord, DateTime<Utc>),
    {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let now = self.clock.now();
        let mut record = self
            .get(id)?
            .unwrap_or_else(|| StatusRecord::first_seen(now));
        apply(&mut record, now);
        self.write(id, &record)?;
        debug!(
            item_id = %id,
            state = ?record.state,
            attempts = record.attempt_count,
            "Status updated"
        );
        Ok(record)
    }

    // SyncData blocks the calling runtime thread for one fsync; fine for a
    // pool of a few workers, move to spawn_blocking before raising it far.
    fn write(&self, id: &ItemId, record: &StatusRecord) -> Result<()> {
        let value = serde_json::to_vec(record)?;
        self.partition.insert(encode_status_key(id), value)?;
        self.keyspace.persist(PersistMode::SyncData)?;
        Ok(())
    }

    /// Overwrite a record with arbitrary bytes
    #[cfg(test)]
    pub(crate) fn write_raw(&self, id: &ItemId, value: &[u8]) -> Result<()> {
        self.partition.insert(encode_status_key(id), value)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::ledger::LedgerStore;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn create_test_ledger() -> (StatusLedger, ManualClock, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let clock = ManualClock::default();
        let store =
            LedgerStore::open_with_clock(temp_dir.path().join("ledger"), Arc::new(clock.clone()))
                .unwrap();
        (store.status().clone(), clock, temp_dir)
    }

    fn ids(raw: &[u64]) -> Vec<ItemId> {
        raw.iter().copied().map(ItemId::from).collect()
    }

    #[test]
    fn test_unknown_item_is_pending() {
        let (ledger, _clock, _temp) = create_test_ledger();
        let id = ItemId::from(10u64);
        assert!(ledger.get(&id).unwrap().is_none());
        assert!(!ledger.is_done(&id).unwrap());
    }

    #[test]
    fn test_attempt_then_success() {
        let (ledger, _clock, _temp) = create_test_ledger();
        let id = ItemId::from(10u64);

        let record = ledger.mark_attempt(&id).unwrap();
        assert_eq!(record.state, ItemState::Pending);
        assert_eq!(record.attempt_count, 1);

        let record = ledger.mark_success(&id).unwrap();
        assert_eq!(record.state, ItemState::Success);
        assert!(record.last_success_at.is_some());
        assert_eq!(record.attempt_count, 1);
        assert!(ledger.is_done(&id).unwrap());
    }

    #[test]
    fn test_attempt_count_is_monotonic() {
        let (ledger, _clock, _temp) = create_test_ledger();
        let id = ItemId::from(7u64);

        let mut last = 0;
        for _ in 0..3 {
            let attempted = ledger.mark_attempt(&id).unwrap();
            assert!(attempted.attempt_count > last);
            last = attempted.attempt_count;
            let failed = ledger.mark_failed(&id).unwrap();
            assert_eq!(failed.attempt_count, last);
            assert_eq!(failed.state, ItemState::Failed);
        }
        ledger.reset(&id).unwrap();
        assert_eq!(ledger.get(&id).unwrap().unwrap().attempt_count, 3);
    }

    #[test]
    fn test_attempt_keeps_success_state() {
        let (ledger, _clock, _temp) = create_test_ledger();
        let id = ItemId::from(1u64);
        ledger.mark_success(&id).unwrap();

        let record = ledger.mark_attempt(&id).unwrap();
        assert_eq!(record.state, ItemState::Success);
        assert_eq!(record.attempt_count, 2);
    }

    #[test]
    fn test_direct_success_satisfies_invariant() {
        let (ledger, _clock, _temp) = create_test_ledger();
        let record = ledger.mark_success(&ItemId::from(3u64)).unwrap();
        assert_eq!(record.attempt_count, 1);
        assert_eq!(record.last_success_at, Some(record.last_attempt_at));
    }

    #[test]
    fn test_pending_subset_excludes_done_prefix() {
        let (ledger, _clock, _temp) = create_test_ledger();
        let universe = ids(&[1, 2, 3, 4, 5, 6]);
        for id in &universe[..3] {
            ledger.mark_success(id).unwrap();
        }

        let pending = ledger.pending_subset(universe.clone()).unwrap();
        assert_eq!(pending, universe[3..].to_vec());
    }

    #[test]
    fn test_pending_subset_includes_failed_and_dedupes() {
        let (ledger, _clock, _temp) = create_test_ledger();
        ledger.mark_attempt(&ItemId::from(2u64)).unwrap();
        ledger.mark_failed(&ItemId::from(2u64)).unwrap();
        ledger.mark_success(&ItemId::from(1u64)).unwrap();

        let pending = ledger.pending_subset(ids(&[1, 2, 2, 3, 1])).unwrap();
        assert_eq!(pending, ids(&[2, 3]));
    }

    #[test]
    fn test_success_is_never_pending_again_without_reset() {
        let (ledger, clock, _temp) = create_test_ledger();
        let id = ItemId::from(42u64);
        ledger.mark_success(&id).unwrap();

        clock.advance(Duration::from_secs(365 * 86_400));
        assert!(ledger.pending_subset(vec![id.clone()]).unwrap().is_empty());
        assert!(ledger.pending_subset(vec![id.clone()]).unwrap().is_empty());

        ledger.reset(&id).unwrap();
        assert_eq!(ledger.pending_subset(vec![id.clone()]).unwrap(), vec![id]);
    }

    #[test]
    fn test_refresh_window_makes_stale_success_pending() {
        let (ledger, clock, _temp) = create_test_ledger();
        let ledger = ledger.with_refresh_after(Some(Duration::from_secs(86_400)));
        let id = ItemId::from(42u64);
        ledger.mark_success(&id).unwrap();

        clock.advance(Duration::from_secs(3_600));
        assert!(ledger.is_done(&id).unwrap());

        clock.advance(Duration::from_secs(86_400));
        assert!(!ledger.is_done(&id).unwrap());
        assert_eq!(ledger.stats().unwrap().stale, 1);
    }

    #[test]
    fn test_reset_unknown_item_is_noop() {
        let (ledger, _clock, _temp) = create_test_ledger();
        assert!(ledger.reset(&ItemId::from(99u64)).unwrap().is_none());
        assert_eq!(ledger.stats().unwrap().total, 0);
    }

    #[test]
    fn test_stats_and_records() {
        let (ledger, _clock, _temp) = create_test_ledger();
        ledger.mark_success(&ItemId::from(1u64)).unwrap();
        ledger.mark_attempt(&ItemId::from(2u64)).unwrap();
        ledger.mark_failed(&ItemId::from(3u64)).unwrap();

        let stats = ledger.stats().unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.success, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.stale, 0);

        let records = ledger.records().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].0, ItemId::from(1u64));
    }

    #[test]
    fn test_state_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ledger");
        {
            let store = LedgerStore::open(&path).unwrap();
            store.status().mark_attempt(&ItemId::from(5u64)).unwrap();
            store.status().mark_success(&ItemId::from(5u64)).unwrap();
        }

        let store = LedgerStore::open(&path).unwrap();
        assert!(store.status().is_done(&ItemId::from(5u64)).unwrap());
    }
}

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use fjall::{Keyspace, PartitionHandle, PersistMode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::SharedClock;
use crate::item::ItemId;

use super::error::Result;
use super::partitions::encode_failure_key;

/// Why an item was quarantined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCauseKind {
    /// The provider rejected the item outright
    Permanent,
    /// Transient failures until the attempt budget ran out
    AttemptsExhausted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureCause {
    pub kind: FailureCauseKind,
    pub message: String,
}

impl FailureCause {
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: FailureCauseKind::Permanent,
            message: message.into(),
        }
    }

    pub fn attempts_exhausted(message: impl Into<String>) -> Self {
        Self {
            kind: FailureCauseKind::AttemptsExhausted,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub item_id: ItemId,
    pub provider: String,
    pub cause: FailureCause,
    pub quarantined_at: DateTime<Utc>,
    pub attempt_count: u32,
}

/// Durable list of quarantined items
///
/// Records leave only through [`FailureLedger::release`].
#[derive(Clone)]
pub struct FailureLedger {
    keyspace: Keyspace,
    partition: PartitionHandle,
    clock: SharedClock,
    write_lock: Arc<Mutex<()>>,
}

impl FailureLedger {
    pub(crate) fn new(keyspace: Keyspace, partition: PartitionHandle, clock: SharedClock) -> Self {
        Self {
            keyspace,
            partition,
            clock,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Quarantine an item. Repeated calls overwrite the previous record.
    pub fn quarantine(
        &self,
        id: &ItemId,
        provider: &str,
        cause: FailureCause,
        attempt_count: u32,
    ) -> Result<FailureRecord> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let record = FailureRecord {
            item_id: id.clone(),
            provider: provider.to_string(),
            cause,
            quarantined_at: self.clock.now(),
            attempt_count,
        };

        let value = serde_json::to_vec(&record)?;
        self.partition.insert(encode_failure_key(id), value)?;
        // blocking fsync on the calling thread, same as status writes
        self.keyspace.persist(PersistMode::SyncData)?;

        info!(
            item_id = %id,
            provider,
            kind = ?record.cause.kind,
            attempts = attempt_count,
            "Item quarantined"
        );
        Ok(record)
    }

    pub fn get(&self, id: &ItemId) -> Result<Option<FailureRecord>> {
        match self.partition.get(encode_failure_key(id))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    pub fn is_quarantined(&self, id: &ItemId) -> Result<bool> {
        Ok(self.partition.get(encode_failure_key(id))?.is_some())
    }

    /// All quarantined items, in key order
    pub fn list_quarantined(&self) -> Result<Vec<FailureRecord>> {
        let mut records = Vec::new();
        for item in self.partition.iter() {
            let (_, value) = item?;
            records.push(serde_json::from_slice(&value)?);
        }
        Ok(records)
    }

    pub fn count(&self) -> Result<usize> {
        let mut count = 0;
        for item in self.partition.iter() {
            item?;
            count += 1;
        }
        Ok(count)
    }

    /// Remove an item from quarantine. Resetting its status is up to the caller.
    pub fn release(&self, id: &ItemId) -> Result<Option<FailureRecord>> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let Some(record) = self.get(id)? else {
            return Ok(None);
        };

        self.partition.remove(encode_failure_key(id))?;
        self.keyspace.persist(PersistMode::SyncData)?;
        debug!(item_id = %id, "Item released from quarantine");
        Ok(Some(record))
    }
}

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{PayloadSink, SinkError};
use crate::item::ItemId;

/// Writes each payload to `<dir>/<item_id>.json`
///
/// Files are written to a temporary name and renamed into place, so a
/// crash never leaves a truncated payload behind.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File for `id`. Path separators, `:`, NUL and `%` itself are
    /// percent-encoded, so distinct ids never share a file.
    pub fn path_for(&self, id: &ItemId) -> PathBuf {
        let mut file_stem = String::with_capacity(id.as_str().len());
        for c in id.as_str().chars() {
            match c {
                '%' | '/' | '\\' | ':' | '\0' => file_stem.push_str(&format!("%{:02X}", c as u32)),
                c => file_stem.push(c),
            }
        }
        self.dir.join(format!("{}.json", file_stem))
    }
}

#[async_trait]
impl PayloadSink<Bytes> for DirectorySink {
    async fn store(&self, id: &ItemId, payload: Bytes) -> Result<(), SinkError> {
        if payload.is_empty() {
            return Err(SinkError::Rejected(format!("empty payload for {}", id)));
        }

        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &payload).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(item_id = %id, path = %path.display(), size = payload.len(), "Payload stored");
        Ok(())
    }
}

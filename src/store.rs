//! Correlation store: event id → [`PublishRecord`].
//!
//! The store is the run's checkpoint. It is loaded once at the start of a
//! run and flushed after every applied mutation, so the persisted copy always
//! reflects the last operation that succeeded remotely.
//!
//! On disk the store is a single JSON object keyed by event id, persisted to
//! `db.json` by default.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, SyncError};
use crate::model::PublishRecord;

/// All records, iterated in key order.
pub type RecordMap = BTreeMap<String, PublishRecord>;

/// Keyed persistent storage for publish records.
pub trait CorrelationStore {
    /// Look up the record for an event id.
    fn get(&self, id: &str) -> Option<&PublishRecord>;

    /// Insert or replace a record.
    fn put(&mut self, id: &str, record: PublishRecord);

    /// Remove a record, returning it if it existed.
    fn remove(&mut self, id: &str) -> Option<PublishRecord>;

    /// All records currently held in memory.
    fn records(&self) -> &RecordMap;

    /// Mutable access for diff bookkeeping (creating and stamping records).
    fn records_mut(&mut self) -> &mut RecordMap;

    /// Persist the in-memory records.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Store`] if the records cannot be written.
    fn flush(&mut self) -> Result<()>;
}

/// JSON file backed store.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    records: RecordMap,
}

impl JsonFileStore {
    /// Load the store from `path`.
    ///
    /// A missing or empty file yields an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Store`] if the file exists but cannot be read or
    /// does not contain a valid record map.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = match std::fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => RecordMap::new(),
            Ok(text) => serde_json::from_str(&text).map_err(|e| {
                SyncError::Store(format!("cannot parse store {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => RecordMap::new(),
            Err(e) => {
                return Err(SyncError::Store(format!(
                    "cannot read store {}: {e}",
                    path.display()
                )));
            }
        };
        debug!(path = %path.display(), records = records.len(), "loaded correlation store");
        Ok(Self { path, records })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "db.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl CorrelationStore for JsonFileStore {
    fn get(&self, id: &str) -> Option<&PublishRecord> {
        self.records.get(id)
    }

    fn put(&mut self, id: &str, record: PublishRecord) {
        self.records.insert(id.to_owned(), record);
    }

    fn remove(&mut self, id: &str) -> Option<PublishRecord> {
        self.records.remove(id)
    }

    fn records(&self) -> &RecordMap {
        &self.records
    }

    fn records_mut(&mut self) -> &mut RecordMap {
        &mut self.records
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                SyncError::Store(format!(
                    "cannot create store directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let json = serde_json::to_string_pretty(&self.records)
            .map_err(|e| SyncError::Store(format!("cannot serialize store: {e}")))?;

        // Write-then-rename so a crash mid-write leaves the previous checkpoint.
        let tmp = self.temp_path();
        std::fs::write(&tmp, json).map_err(|e| {
            SyncError::Store(format!("cannot write store to {}: {e}", tmp.display()))
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            SyncError::Store(format!(
                "cannot move store into place at {}: {e}",
                self.path.display()
            ))
        })?;
        Ok(())
    }
}

/// In-memory store. `flush` snapshots the records so callers can inspect
/// exactly what would have been persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: RecordMap,
    flushed: RecordMap,
    flush_count: usize,
}

impl MemoryStore {
    /// Create a store whose records are already "persisted".
    pub fn with_records(records: RecordMap) -> Self {
        Self {
            flushed: records.clone(),
            records,
            flush_count: 0,
        }
    }

    /// Records as of the last flush.
    pub fn flushed(&self) -> &RecordMap {
        &self.flushed
    }

    /// Number of flushes so far.
    pub fn flush_count(&self) -> usize {
        self.flush_count
    }
}

impl CorrelationStore for MemoryStore {
    fn get(&self, id: &str) -> Option<&PublishRecord> {
        self.records.get(id)
    }

    fn put(&mut self, id: &str, record: PublishRecord) {
        self.records.insert(id.to_owned(), record);
    }

    fn remove(&mut self, id: &str) -> Option<PublishRecord> {
        self.records.remove(id)
    }

    fn records(&self) -> &RecordMap {
        &self.records
    }

    fn records_mut(&mut self) -> &mut RecordMap {
        &mut self.records
    }

    fn flush(&mut self) -> Result<()> {
        self.flushed = self.records.clone();
        self.flush_count += 1;
        Ok(())
    }
}

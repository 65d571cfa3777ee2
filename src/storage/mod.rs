//! Durable snapshot record for cross-invocation counter diffs.
//!
//! Each run persists the full raw counter map plus its capture time as a
//! single JSON document; the next run loads it back as the diff baseline.
//! The record is the only state shared between invocations.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::model::SnapshotRecord;

/// Error type for snapshot record I/O.
#[derive(Debug)]
pub enum StoreError {
    Io(io::Error),
    /// The record exists but is not a valid snapshot document.
    Format(serde_json::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "snapshot record I/O: {}", e),
            StoreError::Format(e) => write!(f, "snapshot record is corrupt: {}", e),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(e) => Some(e),
            StoreError::Format(e) => Some(e),
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self {
        StoreError::Io(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Format(e)
    }
}

/// Reads and writes the named snapshot record under a working directory.
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(work_dir: impl AsRef<Path>, file_name: &str) -> Self {
        Self {
            path: work_dir.as_ref().join(file_name),
        }
    }

    /// Record location, mainly for logging.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the prior snapshot. A missing record is a cold start, not an
    /// error: the caller gets an empty counter map stamped with `now`, so
    /// nothing has a baseline this cycle. A record that exists but cannot
    /// be read or decoded is surfaced as an error.
    pub fn load(&self, now: i64) -> Result<SnapshotRecord, StoreError> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no prior snapshot at {} (cold start)", self.path.display());
                return Ok(SnapshotRecord::empty(now));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(serde_json::from_str(&data)?)
    }

    /// Persists the record, fully replacing any previous one. Written to a
    /// `.tmp` sibling first and renamed into place so a crash mid-write
    /// never leaves a truncated record behind.
    pub fn save(&self, record: &SnapshotRecord) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let tmp_path = self.path.with_extension("tmp");
        let data = serde_json::to_string(record)?;
        std::fs::write(&tmp_path, data)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn sample_record() -> SnapshotRecord {
        let mut counters = HashMap::new();
        counters.insert("ops.mnt.read".to_string(), 42906.0);
        counters.insert("ops.mnt.write".to_string(), 60012.0);
        counters.insert("bytes_sent.mnt.read".to_string(), 7228368.0);
        SnapshotRecord::new(1536731160, counters)
    }

    #[test]
    fn missing_record_is_a_cold_start() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path(), "mackerel-plugin-nfs");

        let record = store.load(1536731220).unwrap();
        assert!(record.counters.is_empty());
        assert_eq!(record.timestamp, 1536731220);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path(), "mackerel-plugin-nfs");

        let record = sample_record();
        store.save(&record).unwrap();
        let loaded = store.load(0).unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn save_fully_replaces_the_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path(), "mackerel-plugin-nfs");

        store.save(&sample_record()).unwrap();

        let mut counters = HashMap::new();
        counters.insert("ops.mnt.read".to_string(), 43026.0);
        let next = SnapshotRecord::new(1536731220, counters);
        store.save(&next).unwrap();

        let loaded = store.load(0).unwrap();
        assert_eq!(loaded, next);
        assert!(!loaded.counters.contains_key("ops.mnt.write"));
    }

    #[test]
    fn corrupt_record_surfaces_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path(), "mackerel-plugin-nfs");
        std::fs::write(store.path(), "not json{").unwrap();

        assert!(matches!(store.load(0), Err(StoreError::Format(_))));
    }

    #[test]
    fn save_creates_the_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("work/sub");
        let store = SnapshotStore::new(&nested, "mackerel-plugin-nfs");

        store.save(&sample_record()).unwrap();
        assert!(store.path().exists());
    }
}

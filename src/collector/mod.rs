//! Collection orchestrator: one invocation of the full
//! parse -> load -> save -> derive pipeline.

pub mod parser;

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::model::SnapshotRecord;
use crate::rates;
use crate::storage::{SnapshotStore, StoreError};

use parser::ParseError;

/// Fatal errors of a collection run. Everything here aborts the invocation;
/// recoverable conditions (cold start, stale interval, counter resets) are
/// handled inside the pipeline with a log line.
#[derive(Debug)]
pub enum CollectError {
    /// The mountstats source could not be read.
    Source(io::Error),
    /// The report parsed but contained no NFS mounts.
    Parse(ParseError),
    /// The new snapshot could not be persisted. Fatal: a silently skipped
    /// save widens the next run's interval and corrupts its rates.
    Store(StoreError),
}

impl fmt::Display for CollectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectError::Source(e) => write!(f, "cannot read mountstats source: {}", e),
            CollectError::Parse(e) => write!(f, "{}", e),
            CollectError::Store(e) => write!(f, "cannot persist snapshot: {}", e),
        }
    }
}

impl std::error::Error for CollectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CollectError::Source(e) => Some(e),
            CollectError::Parse(e) => Some(e),
            CollectError::Store(e) => Some(e),
        }
    }
}

impl From<ParseError> for CollectError {
    fn from(e: ParseError) -> Self {
        CollectError::Parse(e)
    }
}

impl From<StoreError> for CollectError {
    fn from(e: StoreError) -> Self {
        CollectError::Store(e)
    }
}

/// Wires parser, snapshot store, and rate engine together for one run.
pub struct Collector {
    source_path: PathBuf,
    store: SnapshotStore,
}

impl Collector {
    pub fn new(source_path: impl Into<PathBuf>, store: SnapshotStore) -> Self {
        Self {
            source_path: source_path.into(),
            store,
        }
    }

    /// Runs one collection cycle at time `now` (Unix seconds) and returns
    /// the metric set to publish.
    ///
    /// The new snapshot is saved before rates are derived, so even a cycle
    /// that publishes nothing (cold start, stale baseline) leaves a fresh
    /// baseline for the next run.
    pub fn collect(&self, now: i64) -> Result<HashMap<String, f64>, CollectError> {
        let raw = std::fs::read_to_string(&self.source_path).map_err(CollectError::Source)?;
        let (devices, counters) = parser::parse_mount_stats(&raw)?;
        debug!("parsed {} nfs device(s): {:?}", devices.len(), devices);

        let previous = match self.store.load(now) {
            Ok(record) => record,
            Err(e) => {
                warn!("ignoring prior snapshot: {}", e);
                SnapshotRecord::empty(now)
            }
        };

        self.store
            .save(&SnapshotRecord::new(now, counters.clone()))?;

        let metrics = rates::derive(
            &devices,
            &counters,
            &previous.counters,
            now,
            previous.timestamp,
        )
        .unwrap_or_default();

        Ok(metrics)
    }
}

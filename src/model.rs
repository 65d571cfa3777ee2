//! Core data model: counter vocabulary, structured counter keys, and the
//! persisted snapshot record.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The eight per-operation RPC counters exposed by the kernel, in the
/// positional order they appear on a `per-op statistics` line:
///
/// 1. ops        — requests issued for this operation
/// 2. trans      — transmissions sent (includes retransmissions)
/// 3. timeouts   — major timeouts
/// 4. bytes_sent — bytes sent, RPC headers included
/// 5. bytes_recv — bytes received, RPC headers included
/// 6. queue      — cumulative time queued before transmission (us)
/// 7. rtt        — cumulative wait for server replies (us)
/// 8. execute    — cumulative rpc_init_task..rpc_exit_task time (us)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterKind {
    Ops,
    Trans,
    Timeouts,
    BytesSent,
    BytesRecv,
    Queue,
    Rtt,
    Execute,
}

impl CounterKind {
    /// All kinds in wire order.
    pub const ALL: [CounterKind; 8] = [
        CounterKind::Ops,
        CounterKind::Trans,
        CounterKind::Timeouts,
        CounterKind::BytesSent,
        CounterKind::BytesRecv,
        CounterKind::Queue,
        CounterKind::Rtt,
        CounterKind::Execute,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CounterKind::Ops => "ops",
            CounterKind::Trans => "trans",
            CounterKind::Timeouts => "timeouts",
            CounterKind::BytesSent => "bytes_sent",
            CounterKind::BytesRecv => "bytes_recv",
            CounterKind::Queue => "queue",
            CounterKind::Rtt => "rtt",
            CounterKind::Execute => "execute",
        }
    }
}

/// NFS operations we track. Everything else on a per-op line is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Read,
    Write,
}

impl Operation {
    pub const ALL: [Operation; 2] = [Operation::Read, Operation::Write];

    /// Matches an op-line name (colon already stripped, upper case as the
    /// kernel prints it).
    pub fn from_op_name(name: &str) -> Option<Operation> {
        match name {
            "READ" => Some(Operation::Read),
            "WRITE" => Some(Operation::Write),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::Write => "write",
        }
    }
}

/// Structured key for one raw counter. `Display` yields the canonical flat
/// storage key `"<kind>.<device>.<op>"`; building keys any other way risks
/// collisions as kinds or operations are added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterKey<'a> {
    pub kind: CounterKind,
    pub device: &'a str,
    pub op: Operation,
}

impl<'a> CounterKey<'a> {
    pub fn new(kind: CounterKind, device: &'a str, op: Operation) -> Self {
        Self { kind, device, op }
    }
}

impl fmt::Display for CounterKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}",
            self.kind.as_str(),
            self.device,
            self.op.as_str()
        )
    }
}

/// Sanitizes a mount path into a device identifier usable inside a metric
/// name: leading/trailing slashes trimmed, inner slashes become underscores
/// (`/mnt/data` -> `mnt_data`).
pub fn device_name(mount_path: &str) -> String {
    mount_path.trim_matches('/').replace('/', "_")
}

/// One persisted counter snapshot. A new record fully replaces the old one
/// on every save; the capture time lives in its own field rather than a
/// reserved counter key so it can never collide with a real counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Unix timestamp (seconds) when the counters were captured.
    pub timestamp: i64,
    /// Flat-keyed raw counter values, monotonically non-decreasing between
    /// consecutive snapshots under normal operation.
    pub counters: HashMap<String, f64>,
}

impl SnapshotRecord {
    pub fn new(timestamp: i64, counters: HashMap<String, f64>) -> Self {
        Self {
            timestamp,
            counters,
        }
    }

    /// Cold-start record: nothing to diff against.
    pub fn empty(timestamp: i64) -> Self {
        Self {
            timestamp,
            counters: HashMap::new(),
        }
    }
}

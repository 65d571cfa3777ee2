//! Parser for the kernel mountstats report (`/proc/self/mountstats`).
//!
//! Pure functions over the report text so they can be tested against string
//! fixtures. Only NFS-typed mounts are retained, and within each mount only
//! the `READ`/`WRITE` lines of the per-op statistics block.

use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::warn;

use crate::model::{CounterKey, CounterKind, Operation, device_name};

/// Error type for report parsing failures.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// The report contained no `nfs`/`nfs4` mounts at all.
    NoMountsFound,
    /// A counter field on one per-op line was not numeric. Local to that
    /// line; the surrounding parse continues.
    MalformedCounter { op: String, token: String },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::NoMountsFound => write!(f, "no nfs mount points were found"),
            ParseError::MalformedCounter { op, token } => {
                write!(f, "malformed counter for {}: {:?} is not numeric", op, token)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// One classified report line. The report interleaves mount-table lines with
/// nested per-mount blocks; classification is purely syntactic and the
/// parse loop carries the block state.
#[derive(Debug, PartialEq)]
enum ReportLine<'a> {
    /// `device <src> mounted on <path> with fstype <type> [opts]`
    Device { mount_path: &'a str, fstype: &'a str },
    /// A `device` line with too few fields to carry a mount; ignored.
    ShortDevice,
    /// `RPC iostats version: …` — opens the RPC region of a mount block.
    RpcHeader,
    /// `xprt: …` transport line; not consumed.
    Transport,
    /// `per-op statistics` separator; no-op.
    PerOpHeader,
    /// Anything else with fields; a counter line when inside the RPC region.
    Data(Vec<&'a str>),
    /// Empty line — terminates the current mount block.
    Blank,
}

fn classify(line: &str) -> ReportLine<'_> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    match fields.first() {
        None => ReportLine::Blank,
        Some(&"device") => {
            if fields.len() >= 8 {
                ReportLine::Device {
                    mount_path: fields[4],
                    fstype: fields[7],
                }
            } else {
                ReportLine::ShortDevice
            }
        }
        Some(&"RPC") => ReportLine::RpcHeader,
        Some(&"xprt:") => ReportLine::Transport,
        Some(&"per-op") => ReportLine::PerOpHeader,
        Some(_) => ReportLine::Data(fields),
    }
}

/// Parses the full mountstats report into the list of NFS device names
/// (discovery order, deduplicated by mount path) and the flat counter map.
///
/// A malformed counter line is logged and dropped; a report without any NFS
/// mount fails with [`ParseError::NoMountsFound`].
pub fn parse_mount_stats(input: &str) -> Result<(Vec<String>, HashMap<String, f64>), ParseError> {
    let mut devices: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut counters: HashMap<String, f64> = HashMap::new();

    // Device of the mount block being read, None while outside an NFS block.
    let mut current: Option<String> = None;
    let mut in_rpc = false;

    for line in input.lines() {
        match classify(line) {
            ReportLine::Device { mount_path, fstype } => {
                in_rpc = false;
                if fstype.contains("nfs") {
                    let device = device_name(mount_path);
                    if seen.insert(mount_path.to_string()) {
                        devices.push(device.clone());
                    }
                    current = Some(device);
                } else {
                    current = None;
                }
            }
            ReportLine::ShortDevice => {
                in_rpc = false;
                current = None;
            }
            ReportLine::Blank => {
                in_rpc = false;
                current = None;
            }
            ReportLine::RpcHeader => {
                if current.is_some() {
                    in_rpc = true;
                }
            }
            ReportLine::Transport | ReportLine::PerOpHeader => {}
            ReportLine::Data(fields) => {
                if in_rpc
                    && let Some(device) = &current
                    && let Err(e) = parse_op_line(&mut counters, device, &fields)
                {
                    warn!("dropping per-op line: {}", e);
                }
            }
        }
    }

    if devices.is_empty() {
        return Err(ParseError::NoMountsFound);
    }

    Ok((devices, counters))
}

/// Parses one per-op statistics line. Lines for operations other than
/// `READ`/`WRITE` are silently skipped. The counter fields map positionally
/// to [`CounterKind::ALL`]; on the first non-numeric field the whole line is
/// rejected so a partial set of counters never enters the snapshot.
fn parse_op_line(
    counters: &mut HashMap<String, f64>,
    device: &str,
    fields: &[&str],
) -> Result<(), ParseError> {
    let name = fields[0].trim_end_matches(':');
    let Some(op) = Operation::from_op_name(name) else {
        return Ok(());
    };

    let mut parsed: Vec<(String, f64)> = Vec::with_capacity(CounterKind::ALL.len());
    for (kind, token) in CounterKind::ALL.iter().zip(&fields[1..]) {
        let value: f64 = token.parse().map_err(|_| ParseError::MalformedCounter {
            op: name.to_string(),
            token: token.to_string(),
        })?;
        parsed.push((CounterKey::new(*kind, device, op).to_string(), value));
    }

    counters.extend(parsed);
    Ok(())
}

//! Diff/rate derivation between two counter snapshots.
//!
//! This module is the single source of truth for turning two raw snapshots
//! separated by a wall-clock interval into the published metric set:
//! per-second rates, per-op averages, and retransmission counts.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::model::{CounterKey, CounterKind, Operation};

/// Maximum interval (seconds) for rate computation. A prior snapshot older
/// than this (agent downtime, skipped runs) is unusable as a baseline for
/// per-second rates; the boundary is inclusive.
pub const MAX_INTERVAL_SECS: i64 = 600;

/// Computes the per-key diff with counter-reset clamping: a decreased
/// counter reads as a reset and yields 0 rather than a negative delta.
fn clamped_diff(key: &str, curr: f64, prev: f64) -> f64 {
    if curr < prev {
        warn!("counter {} seems to be reset ({} -> {}), using 0", key, prev, curr);
        0.0
    } else {
        curr - prev
    }
}

/// Inserts a metric only when its value is finite. Averages and ratios
/// divide by the ops delta, which is legitimately 0 in an idle interval;
/// such entries are omitted rather than published as NaN or infinity.
fn push_finite(metrics: &mut HashMap<String, f64>, name: String, value: f64) {
    if value.is_finite() {
        metrics.insert(name, value);
    }
}

/// Derives the published metric set from the current and previous counter
/// snapshots. Returns `None` when the elapsed interval disqualifies the
/// baseline entirely (stale, zero, or negative); the caller still persists
/// the current snapshot so the next cycle can recover.
///
/// Counters missing from the previous snapshot contribute nothing this
/// cycle; a device/operation derives metrics only once all eight of its
/// counters have a baseline.
pub fn derive(
    devices: &[String],
    current: &HashMap<String, f64>,
    previous: &HashMap<String, f64>,
    now_ts: i64,
    prev_ts: i64,
) -> Option<HashMap<String, f64>> {
    let elapsed = now_ts - prev_ts;
    if elapsed > MAX_INTERVAL_SECS {
        info!("previous snapshot is {}s old (limit {}s), skipping this cycle", elapsed, MAX_INTERVAL_SECS);
        return None;
    }
    if elapsed <= 0 {
        info!("no usable interval (elapsed {}s), skipping this cycle", elapsed);
        return None;
    }
    let elapsed = elapsed as f64;

    let mut diffs: HashMap<&str, f64> = HashMap::with_capacity(current.len());
    for (key, &curr) in current {
        match previous.get(key) {
            Some(&prev) => {
                diffs.insert(key.as_str(), clamped_diff(key, curr, prev));
            }
            None => {
                debug!("counter {} has no baseline in the previous snapshot", key);
            }
        }
    }

    let mut metrics: HashMap<String, f64> = HashMap::new();
    for device in devices {
        for op in Operation::ALL {
            let diff_of = |kind: CounterKind| -> Option<f64> {
                diffs
                    .get(CounterKey::new(kind, device, op).to_string().as_str())
                    .copied()
            };

            let Some(ops) = diff_of(CounterKind::Ops) else {
                continue;
            };
            let (Some(trans), Some(bytes_sent), Some(bytes_recv)) = (
                diff_of(CounterKind::Trans),
                diff_of(CounterKind::BytesSent),
                diff_of(CounterKind::BytesRecv),
            ) else {
                continue;
            };
            let (Some(queue), Some(rtt), Some(execute)) = (
                diff_of(CounterKind::Queue),
                diff_of(CounterKind::Rtt),
                diff_of(CounterKind::Execute),
            ) else {
                continue;
            };

            let bytes = bytes_sent + bytes_recv;
            let retrans = trans - ops;
            let suffix = format!("{}.{}", device, op.as_str());

            metrics.insert(format!("ops.{}", suffix), ops / elapsed);
            metrics.insert(format!("throughput.{}", suffix), bytes / elapsed);
            metrics.insert(format!("retrans_num.{}", suffix), retrans);
            push_finite(&mut metrics, format!("bytes_ops.{}", suffix), bytes / ops);
            push_finite(&mut metrics, format!("retrans_rate.{}", suffix), retrans / ops);
            push_finite(&mut metrics, format!("rtt_ave.{}", suffix), rtt / ops);
            push_finite(&mut metrics, format!("execute_ave.{}", suffix), execute / ops);
            push_finite(&mut metrics, format!("queue_ave.{}", suffix), queue / ops);
        }
    }

    Some(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn devices() -> Vec<String> {
        vec!["mnt".to_string()]
    }

    /// Full 8-counter snapshot for one device/op.
    fn snapshot(device: &str, op: &str, values: [f64; 8]) -> HashMap<String, f64> {
        let mut map = HashMap::new();
        let kinds = [
            "ops",
            "trans",
            "timeouts",
            "bytes_sent",
            "bytes_recv",
            "queue",
            "rtt",
            "execute",
        ];
        for (kind, value) in kinds.iter().zip(values) {
            map.insert(format!("{}.{}.{}", kind, device, op), value);
        }
        map
    }

    #[test]
    fn ops_rate_over_sixty_seconds() {
        let prev = snapshot("mnt", "read", [42906.0, 42906.0, 0.0, 100.0, 200.0, 60.0, 120.0, 240.0]);
        let curr = snapshot("mnt", "read", [43026.0, 43026.0, 0.0, 700.0, 800.0, 180.0, 360.0, 720.0]);

        let metrics = derive(&devices(), &curr, &prev, 1536731220, 1536731160).unwrap();

        assert_eq!(metrics["ops.mnt.read"], 2.0); // 120 ops / 60s
        assert_eq!(metrics["throughput.mnt.read"], 20.0); // (600 + 600) / 60
        assert_eq!(metrics["bytes_ops.mnt.read"], 10.0); // 1200 / 120
        assert_eq!(metrics["retrans_num.mnt.read"], 0.0);
        assert_eq!(metrics["retrans_rate.mnt.read"], 0.0);
        assert_eq!(metrics["rtt_ave.mnt.read"], 2.0); // 240 / 120
        assert_eq!(metrics["execute_ave.mnt.read"], 4.0);
        assert_eq!(metrics["queue_ave.mnt.read"], 1.0);
    }

    #[test]
    fn read_and_write_derive_independently() {
        let mut prev = snapshot("mnt", "read", [42906.0, 42906.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        prev.extend(snapshot("mnt", "write", [60012.0, 60012.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]));
        let mut curr = snapshot("mnt", "read", [43026.0, 43026.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        curr.extend(snapshot("mnt", "write", [60192.0, 60192.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]));

        let metrics = derive(&devices(), &curr, &prev, 60, 0).unwrap();

        assert_eq!(metrics["ops.mnt.read"], 2.0);
        assert_eq!(metrics["ops.mnt.write"], 3.0);
    }

    #[test]
    fn staleness_boundary_is_inclusive_at_600() {
        let prev = snapshot("mnt", "read", [0.0; 8]);
        let curr = snapshot("mnt", "read", [600.0, 600.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);

        let metrics = derive(&devices(), &curr, &prev, 600, 0).unwrap();
        assert_eq!(metrics["ops.mnt.read"], 1.0);

        assert!(derive(&devices(), &curr, &prev, 601, 0).is_none());
    }

    #[test]
    fn zero_or_negative_interval_yields_nothing() {
        let prev = snapshot("mnt", "read", [0.0; 8]);
        let curr = snapshot("mnt", "read", [10.0, 10.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);

        assert!(derive(&devices(), &curr, &prev, 100, 100).is_none());
        assert!(derive(&devices(), &curr, &prev, 90, 100).is_none());
    }

    #[test]
    fn counter_reset_is_clamped_to_zero() {
        // ops went backwards (client remount); the diff reads as 0 and the
        // rest of the mount's metrics still derive.
        let prev = snapshot("mnt", "read", [50000.0, 50000.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let curr = snapshot("mnt", "read", [120.0, 180.0, 0.0, 600.0, 600.0, 0.0, 0.0, 0.0]);

        let metrics = derive(&devices(), &curr, &prev, 60, 0).unwrap();

        assert_eq!(metrics["ops.mnt.read"], 0.0);
        assert_eq!(metrics["throughput.mnt.read"], 20.0);
        // Averages divide by the clamped ops diff and are suppressed.
        assert!(!metrics.contains_key("bytes_ops.mnt.read"));
    }

    #[test]
    fn zero_ops_interval_suppresses_averages_only() {
        let prev = snapshot("mnt", "read", [100.0, 100.0, 0.0, 1000.0, 1000.0, 5.0, 5.0, 5.0]);
        let curr = snapshot("mnt", "read", [100.0, 100.0, 0.0, 1600.0, 1600.0, 5.0, 5.0, 5.0]);

        let metrics = derive(&devices(), &curr, &prev, 60, 0).unwrap();

        assert_eq!(metrics["ops.mnt.read"], 0.0);
        assert_eq!(metrics["throughput.mnt.read"], 20.0);
        assert_eq!(metrics["retrans_num.mnt.read"], 0.0);
        assert!(!metrics.contains_key("bytes_ops.mnt.read"));
        assert!(!metrics.contains_key("retrans_rate.mnt.read"));
        assert!(!metrics.contains_key("rtt_ave.mnt.read"));
        assert!(!metrics.contains_key("execute_ave.mnt.read"));
        assert!(!metrics.contains_key("queue_ave.mnt.read"));
    }

    #[test]
    fn retransmissions_surface_as_count_and_rate() {
        let prev = snapshot("mnt", "write", [0.0; 8]);
        let curr = snapshot("mnt", "write", [100.0, 125.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);

        let metrics = derive(&devices(), &curr, &prev, 100, 0).unwrap();

        assert_eq!(metrics["retrans_num.mnt.write"], 25.0);
        assert_eq!(metrics["retrans_rate.mnt.write"], 0.25);
    }

    #[test]
    fn missing_baseline_skips_the_device_op() {
        // A freshly appeared mount has no previous counters at all.
        let prev = HashMap::new();
        let curr = snapshot("mnt", "read", [100.0, 100.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);

        let metrics = derive(&devices(), &curr, &prev, 60, 0).unwrap();
        assert!(metrics.is_empty());
    }
}

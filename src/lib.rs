//! nfsrate — NFS client counter-rate collector.
//!
//! Parses the kernel mountstats report, diffs the raw counters against the
//! snapshot persisted by the previous invocation, and derives per-mount
//! throughput, latency, and retransmission metrics for a monitoring agent.
//!
//! - `model` — counter vocabulary, structured keys, snapshot record
//! - `collector` — orchestrator and mountstats parser
//! - `storage` — durable snapshot record (load/save)
//! - `rates` — diff and rate derivation
//! - `graphs` — agent graph-definition schema

pub mod collector;
pub mod graphs;
pub mod model;
pub mod rates;
pub mod storage;

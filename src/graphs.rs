//! Graph-definition metadata for the monitoring agent.
//!
//! The agent asks the plugin for its graph schema once (with
//! `MACKEREL_AGENT_PLUGIN_META` set) and for metric values on every regular
//! invocation. The schema mirrors the eight published metric categories.

use std::collections::BTreeMap;

use serde::Serialize;

/// One series inside a graph.
#[derive(Debug, Clone, Serialize)]
pub struct GraphMetric {
    pub name: String,
    pub label: String,
}

/// One graph definition. The `#` in the graph key is the agent's wildcard
/// for the device segment of the metric name.
#[derive(Debug, Clone, Serialize)]
pub struct Graph {
    pub label: String,
    pub unit: String,
    pub metrics: Vec<GraphMetric>,
}

fn read_write_series() -> Vec<GraphMetric> {
    vec![
        GraphMetric {
            name: "read".to_string(),
            label: "reads".to_string(),
        },
        GraphMetric {
            name: "write".to_string(),
            label: "writes".to_string(),
        },
    ]
}

/// Builds the full graph schema for a metric-key prefix. The label prefix
/// upper-cases the default `nfs` prefix the way the agent UI expects.
pub fn definitions(prefix: &str) -> BTreeMap<String, Graph> {
    let label_prefix = prefix.replace("nfs", "NFS");
    let graph = |label: &str, unit: &str| Graph {
        label: format!("{} {}", label_prefix, label),
        unit: unit.to_string(),
        metrics: read_write_series(),
    };

    let mut graphs = BTreeMap::new();
    graphs.insert("ops.#".to_string(), graph("Operations", "iops"));
    graphs.insert("throughput.#".to_string(), graph("Throughput", "bytes/sec"));
    graphs.insert("bytes_ops.#".to_string(), graph("Byte Per Operations", "bytes"));
    graphs.insert("retrans_num.#".to_string(), graph("Retrans Num", "integer"));
    graphs.insert("retrans_rate.#".to_string(), graph("Retrans Rate", "percentage"));
    graphs.insert("rtt_ave.#".to_string(), graph("RTT Average (ms)", "integer"));
    graphs.insert("execute_ave.#".to_string(), graph("Execute Average (ms)", "integer"));
    graphs.insert("queue_ave.#".to_string(), graph("Queue Average (ms)", "integer"));
    graphs
}

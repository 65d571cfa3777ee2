//! nfsrate - NFS client metrics plugin.
//!
//! Invoked once per collection interval by the monitoring agent. Reads the
//! kernel mountstats report, derives per-interval rates against the snapshot
//! saved by the previous run, and prints the metric set to stdout.

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use clap::Parser;
use tracing::{Level, error};
use tracing_subscriber::EnvFilter;

use nfsrate::collector::Collector;
use nfsrate::graphs;
use nfsrate::storage::SnapshotStore;

/// NFS client metrics plugin.
#[derive(Parser)]
#[command(name = "nfsrate", about = "NFS client metrics plugin", version)]
struct Args {
    /// Metric key prefix.
    #[arg(long, default_value = "nfs")]
    metric_key_prefix: String,

    /// Snapshot record file name (defaults to mackerel-plugin-<prefix>).
    #[arg(long)]
    tempfile: Option<String>,

    /// Path to the kernel mountstats report.
    #[arg(long, default_value = "/proc/self/mountstats")]
    mountstats: PathBuf,

    /// Increase logging verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Logs go to stderr; stdout is reserved for the metric lines.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("nfsrate={}", level).parse().unwrap());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Working directory for the snapshot record: the agent's plugin work dir
/// when set, the system temp dir otherwise.
fn plugin_work_dir() -> PathBuf {
    std::env::var_os("MACKEREL_PLUGIN_WORKDIR")
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    // Schema handshake: the agent sets this when it wants graph definitions
    // instead of metric values.
    if std::env::var_os("MACKEREL_AGENT_PLUGIN_META").is_some_and(|v| !v.is_empty()) {
        let meta = serde_json::json!({
            "graphs": graphs::definitions(&args.metric_key_prefix),
        });
        println!("# mackerel-agent-plugin");
        println!("{}", meta);
        return ExitCode::SUCCESS;
    }

    let record_name = args
        .tempfile
        .unwrap_or_else(|| format!("mackerel-plugin-{}", args.metric_key_prefix));
    let store = SnapshotStore::new(plugin_work_dir(), &record_name);
    let collector = Collector::new(&args.mountstats, store);

    let now = Utc::now().timestamp();
    let metrics = match collector.collect(now) {
        Ok(metrics) => metrics,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    // Deterministic output order keeps runs diffable.
    let mut names: Vec<&String> = metrics.keys().collect();
    names.sort();
    for name in names {
        println!("{}.{}\t{}\t{}", args.metric_key_prefix, name, metrics[name], now);
    }

    ExitCode::SUCCESS
}

use clap::Parser;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use sweepbench_client::load::{self, Workload};
use sweepbench_client::ClientConfig;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Echo-protocol load generator. Prints one summary line to stdout and,
/// when a path is given, one latency (nanoseconds) per line to that file.
#[derive(Parser)]
#[command(name = "sweepbench-client")]
struct Args {
    /// Server host name or address
    host: String,

    /// Server port
    port: u16,

    /// Number of concurrent connections
    #[arg(default_value_t = 1)]
    concurrency: u32,

    /// File to receive raw latencies
    latency_out: Option<PathBuf>,

    /// Warm-up before counting starts (seconds)
    #[arg(long, default_value_t = 5)]
    warmup_secs: u64,

    /// Length of the counting window (seconds)
    #[arg(long, default_value_t = 30)]
    measure_secs: u64,

    /// Keep load steady this long after counting stops (milliseconds)
    #[arg(long, default_value_t = 500)]
    cooldown_ms: u64,

    /// Keep at most this many latencies per connection
    #[arg(long)]
    reservoir: Option<usize>,
}

#[tokio::main]
async fn main() {
    // stdout carries the report line; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sweepbench=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let addr = match tokio::net::lookup_host((args.host.as_str(), args.port)).await {
        Ok(mut addrs) => match addrs.next() {
            Some(addr) => addr,
            None => {
                error!(host = %args.host, "host resolved to no addresses");
                process::exit(1);
            }
        },
        Err(e) => {
            error!(host = %args.host, "failed to resolve host: {e}");
            process::exit(1);
        }
    };

    let workload = Workload::Timed {
        warmup: Duration::from_secs(args.warmup_secs),
        measure: Duration::from_secs(args.measure_secs),
        cooldown: Duration::from_millis(args.cooldown_ms),
    };

    info!(%addr, concurrency = args.concurrency, "starting load");
    let result = match load::drive(&ClientConfig::new(addr), args.concurrency, workload, args.reservoir).await {
        Ok(result) => result,
        Err(e) => {
            error!("load run failed: {e}");
            process::exit(1);
        }
    };

    if let Some(path) = &args.latency_out {
        if let Err(e) = write_latencies(path, &result.latencies_ns) {
            error!(path = %path.display(), "failed to write latencies: {e}");
            process::exit(1);
        }
    }

    println!("{}", result.to_report());
}

fn write_latencies(path: &Path, latencies_ns: &[u64]) -> std::io::Result<()> {
    let mut out = BufWriter::new(std::fs::File::create(path)?);
    for latency in latencies_ns {
        writeln!(out, "{latency}")?;
    }
    out.flush()
}

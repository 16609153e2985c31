use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process;
use sweepbench_harness::config::{ClientMode, SweepConfig};
use sweepbench_harness::driver::{ClientDriver, ExternalDriver, InProcessDriver};
use sweepbench_harness::runner::TrialRunner;
use sweepbench_harness::table::{LabelOrder, Metric, ResultTable};
use sweepbench_stats::percentile;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, ValueEnum)]
enum ClientArg {
    InProcess,
    External,
}

#[derive(Parser)]
#[command(name = "sweepbench", about = "Concurrency sweep benchmark for echo servers")]
struct Args {
    /// Configuration file (default: sweepbench.toml found from the working directory up)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Trials per concurrency level
    #[arg(long)]
    trials: Option<usize>,

    /// Sweep 1..=5 then every other level up to this many clients
    #[arg(long)]
    max_clients: Option<u32>,

    /// Where to write the result table
    #[arg(long, default_value = "results.json")]
    output: PathBuf,

    /// Run clients in-process or as a separate program
    #[arg(long, value_enum)]
    client: Option<ClientArg>,

    /// Debug logging unless RUST_LOG is set
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let default_filter = if args.verbose { "sweepbench=debug" } else { "sweepbench=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    match run(args).await {
        Ok(true) => process::exit(0),
        Ok(false) => process::exit(1),
        Err(e) => {
            error!("{e:#}");
            process::exit(2);
        }
    }
}

/// Returns `Ok(false)` when at least one sweep failed.
async fn run(args: Args) -> anyhow::Result<bool> {
    let mut config = match &args.config {
        Some(path) => SweepConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SweepConfig::discover()
            .context("loading discovered sweepbench.toml")?
            .unwrap_or_default(),
    };
    if let Some(trials) = args.trials {
        config.trials = trials;
    }
    if let Some(max) = args.max_clients {
        config.max_clients = max;
        config.concurrency_levels = None;
    }
    match args.client {
        Some(ClientArg::InProcess) => config.client.mode = ClientMode::InProcess,
        Some(ClientArg::External) => config.client.mode = ClientMode::External,
        None => {}
    }

    let settings = config.settings().context("invalid configuration")?;
    info!(
        trials = settings.trials,
        levels = ?settings.concurrency_levels,
        confidence = settings.confidence_level,
        "sweep configured"
    );

    let timeout = config.client_timeout()?;
    let (table, all_ok) = match config.client.mode {
        ClientMode::InProcess => {
            let driver = InProcessDriver::new(
                config.workload.to_workload()?,
                config.reservoir(),
                timeout,
            );
            run_all(TrialRunner::new(settings, driver), &config).await
        }
        ClientMode::External => {
            let driver = ExternalDriver::new(config.client_command(), timeout)
                .with_latencies(config.client.record_latencies);
            run_all(TrialRunner::new(settings, driver), &config).await
        }
    };

    print_report(&table, &LabelOrder(config.label_order.clone()));
    table
        .write_json(&args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    println!("Results written to {}", args.output.display());
    Ok(all_ok)
}

/// Sweep every configured server in turn. A failed sweep is logged, its
/// partial rows kept, and the next server still runs.
async fn run_all<D: ClientDriver>(
    mut runner: TrialRunner<D>,
    config: &SweepConfig,
) -> (ResultTable, bool) {
    let mut table = ResultTable::new();
    let mut all_ok = true;
    for spec in config.servers() {
        match runner.run_sweep(&spec).await {
            Ok(rows) => table.extend(rows),
            Err(failure) => {
                error!(server = %failure.server, key = ?failure.key, "{failure}");
                all_ok = false;
                table.extend(failure.partial);
            }
        }
    }
    (table, all_ok)
}

fn print_report(table: &ResultTable, ordering: &LabelOrder) {
    println!();
    println!("SweepBench Results");
    println!("==================");
    for row in table.sorted(ordering) {
        let s = &row.summary;
        let mut line = format!(
            "{:<40} {:<10} {:>14.3} ± {:<12.3} {} (n={})",
            row.key.to_string(),
            row.metric.to_string(),
            s.mean,
            s.half_width,
            row.metric.units(),
            s.count,
        );
        if row.metric == Metric::Latency {
            if let Some(raw) = table.raw_samples(&row.key, Metric::Latency) {
                line.push_str(&format!(
                    "  p50 {:.1} p99 {:.1}",
                    percentile(raw, 0.50),
                    percentile(raw, 0.99)
                ));
            }
        }
        println!("{line}");
    }
    if !table.missing.is_empty() {
        println!();
        println!("Missing data:");
        for missing in &table.missing {
            println!(
                "  {:<40} {}/{} trials: {}",
                missing.key.to_string(),
                missing.completed_trials,
                missing.expected_trials,
                missing.reason
            );
        }
    }
    println!();
}

//! Client drivers: run one trial's worth of load against a live server.
//!
//! A run is all-or-nothing. Drivers return either a complete [`RunResult`]
//! or an error; partial worker output is never handed back.

use async_trait::async_trait;
use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use sweepbench_client::load::{self, Workload};
use sweepbench_client::ClientConfig;
use sweepbench_common::{parse_report, BenchError, ExperimentKey, Result, SampleSet};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// Where a server under test is listening
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
}

impl ServerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }

    pub async fn resolve(&self) -> Result<SocketAddr> {
        tokio::net::lookup_host((self.host.as_str(), self.port))
            .await?
            .next()
            .ok_or_else(|| BenchError::ClientFailure(format!("{self} resolved to no addresses")))
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Outcome of one successful client run
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    /// Requests per second over the measurement window
    pub throughput: f64,
    /// Per-request latencies in microseconds
    pub latencies: SampleSet,
    /// Requests completed inside the measurement window
    pub completed: u64,
    pub elapsed: Duration,
}

/// Drives `key.concurrency` concurrent clients against a server
#[async_trait]
pub trait ClientDriver: Send + Sync {
    async fn run(&self, addr: &ServerAddress, key: &ExperimentKey) -> Result<RunResult>;
}

/// Runs the workers as tasks inside the harness process
#[derive(Debug, Clone)]
pub struct InProcessDriver {
    pub workload: Workload,
    pub reservoir: Option<usize>,
    /// Bound on the whole run
    pub timeout: Duration,
}

impl InProcessDriver {
    pub fn new(workload: Workload, reservoir: Option<usize>, timeout: Duration) -> Self {
        Self { workload, reservoir, timeout }
    }
}

#[async_trait]
impl ClientDriver for InProcessDriver {
    async fn run(&self, addr: &ServerAddress, key: &ExperimentKey) -> Result<RunResult> {
        let config = ClientConfig::new(addr.resolve().await?);
        let result = timeout(
            self.timeout,
            load::drive(&config, key.concurrency, self.workload, self.reservoir),
        )
        .await
        .map_err(|_| BenchError::Timeout { what: format!("client run {key}"), after: self.timeout })?
        .map_err(|e| match e {
            BenchError::Timeout { .. } | BenchError::ClientFailure(_) => e,
            other => BenchError::ClientFailure(other.to_string()),
        })?;

        let latencies = SampleSet::with_samples(
            key.clone(),
            result.latencies_ns.iter().map(|&ns| ns as f64 / 1000.0).collect(),
        );
        Ok(RunResult {
            throughput: result.throughput(),
            latencies,
            completed: result.requests,
            elapsed: result.elapsed,
        })
    }
}

/// Runs a separate client program per trial.
///
/// The program is called as `command... host port concurrency [latency_path]`
/// and must print its report as the last line on stdout.
#[derive(Debug, Clone)]
pub struct ExternalDriver {
    pub command: Vec<String>,
    pub timeout: Duration,
    pub record_latencies: bool,
}

impl ExternalDriver {
    pub fn new(command: Vec<String>, timeout: Duration) -> Self {
        Self { command, timeout, record_latencies: false }
    }

    pub fn with_latencies(mut self, record: bool) -> Self {
        self.record_latencies = record;
        self
    }
}

#[async_trait]
impl ClientDriver for ExternalDriver {
    async fn run(&self, addr: &ServerAddress, key: &ExperimentKey) -> Result<RunResult> {
        let (program, leading) = self
            .command
            .split_first()
            .ok_or_else(|| BenchError::Config("empty client command".to_string()))?;

        let latency_file = if self.record_latencies {
            Some(tempfile::NamedTempFile::new()?)
        } else {
            None
        };

        let mut cmd = Command::new(program);
        cmd.args(leading)
            .arg(&addr.host)
            .arg(addr.port.to_string())
            .arg(key.concurrency.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(file) = &latency_file {
            cmd.arg(file.path());
        }

        debug!(%program, %addr, concurrency = key.concurrency, "spawning client");
        let start = Instant::now();
        let child = cmd
            .spawn()
            .map_err(|e| BenchError::ClientFailure(format!("failed to spawn {program}: {e}")))?;
        // Dropping the future on timeout drops the child, which kills it.
        let output = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| BenchError::Timeout { what: format!("client run {key}"), after: self.timeout })??;
        let elapsed = start.elapsed();

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BenchError::ClientFailure(format!(
                "{program} exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let rate = parse_report(&stdout)?;
        let samples = match &latency_file {
            Some(file) => read_latencies(file.path())?,
            None => Vec::new(),
        };

        Ok(RunResult {
            throughput: rate.value,
            latencies: SampleSet::with_samples(key.clone(), samples),
            completed: reported_requests(&stdout).unwrap_or(0),
            elapsed,
        })
    }
}

/// Leading `<n> requests` count of the report line, when present
fn reported_requests(stdout: &str) -> Option<u64> {
    let line = stdout.lines().rev().map(str::trim).find(|l| !l.is_empty())?;
    let mut tokens = line.split_whitespace();
    let count = tokens.next()?.parse().ok()?;
    (tokens.next()? == "requests").then_some(count)
}

/// Read a latency file of nanosecond integers, one per line, as microseconds
pub fn read_latencies(path: &Path) -> Result<Vec<f64>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        BenchError::ClientFailure(format!("unreadable latency file {}: {e}", path.display()))
    })?;
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| {
            l.parse::<u64>().map(|ns| ns as f64 / 1000.0).map_err(|_| {
                BenchError::ClientFailure(format!("bad latency value {l:?} in {}", path.display()))
            })
        })
        .collect()
}

//! Configuration loading from sweepbench.toml
//!
//! The file is optional; every field has a default (10 trials, up to 20
//! clients, 1 s readiness delay).
//! Command-line flags override file values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use sweepbench_client::load::Workload;
use sweepbench_common::{BenchError, ExperimentKey, Result};
use sweepbench_stats::DEFAULT_CONFIDENCE_LEVEL;

use crate::server::ServerCommand;

/// File name looked up by [`SweepConfig::discover`].
pub const CONFIG_FILE_NAME: &str = "sweepbench.toml";

/// Per-worker latency cap applied unless the file sets `reservoir_size`.
pub const DEFAULT_RESERVOIR_SIZE: usize = 10_000;

/// Top-level sweep configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Repetitions per concurrency level
    pub trials: usize,
    /// Upper end of the default concurrency ladder
    pub max_clients: u32,
    /// Explicit concurrency levels; overrides `max_clients` when set
    pub concurrency_levels: Option<Vec<u32>>,
    /// Grace period between launching a server and probing it (e.g. "1s")
    pub readiness_delay: String,
    /// Level passed to the inverse t quantile
    pub confidence_level: f64,
    /// Host clients connect to
    pub host: String,
    /// How long to wait for a server to exit after SIGTERM
    pub stop_timeout: String,
    /// Bound on one whole client run
    pub client_timeout: String,
    /// Latencies kept per worker; 0 keeps every sample
    pub reservoir_size: usize,
    /// Request pattern each worker follows
    pub workload: WorkloadConfig,
    /// How client workers are executed
    pub client: ClientSection,
    /// Servers to sweep, in order
    pub servers: Vec<ServerSpec>,
    /// Display order of server variants in reports
    pub label_order: Vec<String>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            trials: 10,
            max_clients: 20,
            concurrency_levels: None,
            readiness_delay: "1s".to_string(),
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
            host: "127.0.0.1".to_string(),
            stop_timeout: "5s".to_string(),
            client_timeout: "120s".to_string(),
            reservoir_size: DEFAULT_RESERVOIR_SIZE,
            workload: WorkloadConfig::default(),
            client: ClientSection::default(),
            servers: Vec::new(),
            label_order: Vec::new(),
        }
    }
}

/// Workload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    pub warmup: String,
    pub measure: String,
    pub cooldown: String,
    /// Switches to a fixed request count per worker when set
    pub requests_per_worker: Option<u64>,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            warmup: "5s".to_string(),
            measure: "30s".to_string(),
            cooldown: "500ms".to_string(),
            requests_per_worker: None,
        }
    }
}

impl WorkloadConfig {
    pub fn to_workload(&self) -> Result<Workload> {
        if let Some(per_worker) = self.requests_per_worker {
            return Ok(Workload::Requests { per_worker });
        }
        Ok(Workload::Timed {
            warmup: parse_duration(&self.warmup)?,
            measure: parse_duration(&self.measure)?,
            cooldown: parse_duration(&self.cooldown)?,
        })
    }
}

/// Where client workers run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ClientMode {
    /// Concurrent tasks inside the harness process (default)
    #[default]
    InProcess,
    /// A separate client program per run
    External,
}

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ClientSection {
    pub mode: ClientMode,
    /// Program and leading arguments for external mode; host, port,
    /// concurrency and the latency path are appended. Defaults to the
    /// `sweepbench-client` binary next to this executable.
    pub command: Vec<String>,
    /// Ask the external client for a raw latency file
    pub record_latencies: bool,
}

/// One server implementation to sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSpec {
    /// Variant label used in experiment keys
    pub name: String,
    /// Program and configuration arguments; the port is appended
    pub command: Vec<String>,
    /// Extra key dimensions recorded with every sample
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl ServerSpec {
    pub fn new(name: impl Into<String>, command: Vec<String>) -> Self {
        Self { name: name.into(), command, params: BTreeMap::new() }
    }

    pub fn key(&self, concurrency: u32) -> ExperimentKey {
        ExperimentKey { variant: self.name.clone(), params: self.params.clone(), concurrency }
    }

    pub fn server_command(&self) -> Result<ServerCommand> {
        ServerCommand::from_argv(&self.command)
    }
}

/// Resolved settings threaded through the trial runner
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub trials: usize,
    pub concurrency_levels: Vec<u32>,
    pub readiness_delay: Duration,
    pub confidence_level: f64,
    pub host: String,
    pub stop_timeout: Duration,
}

impl SweepConfig {
    /// Load configuration from a specific file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| BenchError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| BenchError::Config(e.to_string()))
    }

    /// Discover and load configuration by walking up from the current directory.
    ///
    /// `Ok(None)` means no file was found; a file that exists but does not
    /// parse is an error.
    pub fn discover() -> Result<Option<Self>> {
        let dir = std::env::current_dir()?;
        Self::discover_from(&dir)
    }

    /// Like [`SweepConfig::discover`], starting at `start` instead of the
    /// current directory.
    pub fn discover_from(start: &Path) -> Result<Option<Self>> {
        for dir in start.ancestors() {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.is_file() {
                return Self::load(&config_path).map(Some);
            }
        }
        Ok(None)
    }

    /// Concurrency levels in sweep order
    pub fn levels(&self) -> Vec<u32> {
        match &self.concurrency_levels {
            Some(levels) => levels.clone(),
            None => default_concurrency_levels(self.max_clients),
        }
    }

    /// Servers to sweep; falls back to both runtime flavours of the bundled
    /// echo server when none are configured.
    pub fn servers(&self) -> Vec<ServerSpec> {
        if !self.servers.is_empty() {
            return self.servers.clone();
        }
        let server = sibling_binary("sweepbench-server").display().to_string();
        ["current-thread", "multi-thread"]
            .into_iter()
            .map(|flavor| {
                ServerSpec::new(
                    format!("tokio-{flavor}"),
                    vec![server.clone(), "--runtime".to_string(), flavor.to_string()],
                )
            })
            .collect()
    }

    /// External client command, defaulting to the bundled client binary
    pub fn client_command(&self) -> Vec<String> {
        if !self.client.command.is_empty() {
            return self.client.command.clone();
        }
        vec![sibling_binary("sweepbench-client").display().to_string()]
    }

    /// Reservoir bound handed to the client driver
    pub fn reservoir(&self) -> Option<usize> {
        (self.reservoir_size > 0).then_some(self.reservoir_size)
    }

    pub fn client_timeout(&self) -> Result<Duration> {
        parse_duration(&self.client_timeout)
    }

    /// Reject configurations that cannot produce a meaningful sweep
    pub fn validate(&self) -> Result<()> {
        if self.trials == 0 {
            return Err(BenchError::Config("trials must be at least 1".to_string()));
        }
        let levels = self.levels();
        if levels.is_empty() {
            return Err(BenchError::Config("no concurrency levels configured".to_string()));
        }
        if levels.contains(&0) {
            return Err(BenchError::Config("concurrency levels must be positive".to_string()));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(BenchError::Config(format!(
                "confidence_level must lie in (0, 1), got {}",
                self.confidence_level
            )));
        }
        for server in &self.servers {
            if server.command.is_empty() {
                return Err(BenchError::Config(format!("server {:?} has no command", server.name)));
            }
        }
        if self.client.mode == ClientMode::External && self.client_command().is_empty() {
            return Err(BenchError::Config("external client mode needs a command".to_string()));
        }
        self.workload.to_workload()?;
        self.client_timeout()?;
        parse_duration(&self.readiness_delay)?;
        parse_duration(&self.stop_timeout)?;
        Ok(())
    }

    /// Resolve durations and levels into the runner's settings
    pub fn settings(&self) -> Result<RunSettings> {
        self.validate()?;
        Ok(RunSettings {
            trials: self.trials,
            concurrency_levels: self.levels(),
            readiness_delay: parse_duration(&self.readiness_delay)?,
            confidence_level: self.confidence_level,
            host: self.host.clone(),
            stop_timeout: parse_duration(&self.stop_timeout)?,
        })
    }
}

/// `1..=5`, then every other level from 6 up to `max`.
pub fn default_concurrency_levels(max: u32) -> Vec<u32> {
    (1..=max.min(5)).chain((6..=max).step_by(2)).collect()
}

/// Parse a duration string (e.g., "3s", "500ms", "1.5s", "2m")
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(BenchError::Config("empty duration string".to_string()));
    }

    // Find where the number ends and unit begins
    let (num_part, unit_part) = s
        .char_indices()
        .find(|(_, c)| c.is_alphabetic())
        .map(|(i, _)| s.split_at(i))
        .unwrap_or((s, "s"));

    let value: f64 = num_part
        .trim()
        .parse()
        .map_err(|_| BenchError::Config(format!("invalid duration number: {num_part:?}")))?;
    if !value.is_finite() || value < 0.0 {
        return Err(BenchError::Config(format!("invalid duration: {s:?}")));
    }

    let nanos_per_unit = match unit_part.trim() {
        "ns" => 1.0,
        "us" => 1e3,
        "ms" => 1e6,
        "s" => 1e9,
        "m" => 60e9,
        unit => return Err(BenchError::Config(format!("unknown duration unit: {unit:?}"))),
    };
    Ok(Duration::from_nanos((value * nanos_per_unit).round() as u64))
}

/// Path of a binary built alongside this executable in `target/<profile>/`
/// (or `target/<profile>/deps/` when run as a test).
pub fn sibling_binary(name: &str) -> PathBuf {
    let mut path = std::env::current_exe().unwrap_or_default();
    path.pop(); // remove own filename
    if path.file_name().map(|n| n == "deps").unwrap_or(false) {
        path.pop(); // step out of target/debug/deps → target/debug/
    }
    path.push(name);
    path
}

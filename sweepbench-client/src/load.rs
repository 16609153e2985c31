//! Concurrent load generation against an echo server.
//!
//! Each worker owns its connection and latency buffer; buffers are merged
//! only after every worker has finished. If any worker fails the whole run
//! fails and no partial results are returned.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{JoinError, JoinSet};
use tracing::debug;
use sweepbench_common::{BenchError, ClientReport, Result};

use crate::recorder::LatencyRecorder;
use crate::{ClientConfig, Connection};

/// How long each worker keeps issuing requests
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Workload {
    /// Warm up, count completions during `measure`, then keep the load steady
    /// for `cooldown` while workers wind down.
    Timed { warmup: Duration, measure: Duration, cooldown: Duration },
    /// Every worker issues exactly `per_worker` requests; the timer covers the
    /// whole run.
    Requests { per_worker: u64 },
}

impl Default for Workload {
    fn default() -> Self {
        Workload::Timed {
            warmup: Duration::from_secs(5),
            measure: Duration::from_secs(30),
            cooldown: Duration::from_millis(500),
        }
    }
}

/// Merged outcome of one load run
#[derive(Debug, Clone, PartialEq)]
pub struct LoadResult {
    /// Requests completed inside the measurement window.
    pub requests: u64,
    /// Wall-clock length of the measurement window.
    pub elapsed: Duration,
    /// Recorded latencies from all workers, in nanoseconds.
    pub latencies_ns: Vec<u64>,
}

impl LoadResult {
    /// Total completions over wall-clock time, in requests per second.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.requests as f64 / secs
    }

    pub fn average_latency_ns(&self) -> Option<f64> {
        if self.latencies_ns.is_empty() {
            return None;
        }
        let sum: u128 = self.latencies_ns.iter().map(|&l| l as u128).sum();
        Some(sum as f64 / self.latencies_ns.len() as f64)
    }

    pub fn to_report(&self) -> ClientReport {
        ClientReport {
            requests: self.requests,
            elapsed_ms: self.elapsed.as_millis() as u64,
            average_latency_us: self.average_latency_ns().map(|ns| ns / 1000.0),
        }
    }
}

struct WorkerTally {
    requests: u64,
    latencies_ns: Vec<u64>,
}

#[derive(Default)]
struct Phase {
    counting: AtomicBool,
    quit: AtomicBool,
}

/// Open `concurrency` connections and drive them with `workload`.
///
/// `reservoir` bounds the latencies each worker keeps; `None` keeps all.
pub async fn drive(
    config: &ClientConfig,
    concurrency: u32,
    workload: Workload,
    reservoir: Option<usize>,
) -> Result<LoadResult> {
    if concurrency == 0 {
        return Err(BenchError::ClientFailure("concurrency must be at least 1".to_string()));
    }

    // Connect everything before any load starts; one refused connection fails the run.
    let mut connections = Vec::with_capacity(concurrency as usize);
    for _ in 0..concurrency {
        connections.push(Connection::connect(config).await?);
    }
    debug!(addr = %config.addr, concurrency, "connections established");

    match workload {
        Workload::Timed { warmup, measure, cooldown } => {
            run_timed(connections, warmup, measure, cooldown, reservoir).await
        }
        Workload::Requests { per_worker } => run_counted(connections, per_worker, reservoir).await,
    }
}

async fn run_timed(
    connections: Vec<Connection>,
    warmup: Duration,
    measure: Duration,
    cooldown: Duration,
    reservoir: Option<usize>,
) -> Result<LoadResult> {
    let phase = Arc::new(Phase::default());
    let mut workers = JoinSet::new();
    for conn in connections {
        let phase = Arc::clone(&phase);
        let recorder = LatencyRecorder::new(reservoir);
        workers.spawn(timed_worker(conn, phase, recorder));
    }

    hold(&mut workers, warmup).await?;
    phase.counting.store(true, Ordering::SeqCst);
    let start = Instant::now();
    hold(&mut workers, measure).await?;
    phase.counting.store(false, Ordering::SeqCst);
    let elapsed = start.elapsed();
    hold(&mut workers, cooldown).await?;
    phase.quit.store(true, Ordering::SeqCst);

    let tallies = collect(&mut workers).await?;
    Ok(merge(tallies, elapsed))
}

async fn run_counted(
    connections: Vec<Connection>,
    per_worker: u64,
    reservoir: Option<usize>,
) -> Result<LoadResult> {
    let start = Instant::now();
    let mut workers = JoinSet::new();
    for conn in connections {
        workers.spawn(counted_worker(conn, per_worker, LatencyRecorder::new(reservoir)));
    }
    let tallies = collect(&mut workers).await?;
    Ok(merge(tallies, start.elapsed()))
}

async fn timed_worker(
    mut conn: Connection,
    phase: Arc<Phase>,
    mut recorder: LatencyRecorder,
) -> Result<WorkerTally> {
    let mut requests = 0;
    while !phase.quit.load(Ordering::Relaxed) {
        let start = Instant::now();
        conn.round_trip().await?;
        if phase.counting.load(Ordering::Relaxed) {
            recorder.record(start.elapsed());
            requests += 1;
        }
    }
    Ok(WorkerTally { requests, latencies_ns: recorder.into_samples() })
}

async fn counted_worker(
    mut conn: Connection,
    count: u64,
    mut recorder: LatencyRecorder,
) -> Result<WorkerTally> {
    for _ in 0..count {
        let start = Instant::now();
        conn.round_trip().await?;
        recorder.record(start.elapsed());
    }
    Ok(WorkerTally { requests: count, latencies_ns: recorder.into_samples() })
}

/// Wait out `length`, failing early if a worker stops before it is told to.
async fn hold(workers: &mut JoinSet<Result<WorkerTally>>, length: Duration) -> Result<()> {
    tokio::select! {
        _ = tokio::time::sleep(length) => Ok(()),
        Some(joined) = workers.join_next() => {
            flatten(joined)?;
            Err(BenchError::ClientFailure("worker stopped before the run ended".to_string()))
        }
    }
}

/// Join every worker. The first failure is returned and the remaining
/// workers are aborted when the set is dropped.
async fn collect(workers: &mut JoinSet<Result<WorkerTally>>) -> Result<Vec<WorkerTally>> {
    let mut tallies = Vec::with_capacity(workers.len());
    while let Some(joined) = workers.join_next().await {
        tallies.push(flatten(joined)?);
    }
    Ok(tallies)
}

fn flatten(joined: std::result::Result<Result<WorkerTally>, JoinError>) -> Result<WorkerTally> {
    joined.map_err(|e| BenchError::ClientFailure(format!("worker task failed: {e}")))?
}

fn merge(tallies: Vec<WorkerTally>, elapsed: Duration) -> LoadResult {
    let requests = tallies.iter().map(|t| t.requests).sum();
    let latencies_ns = tallies.into_iter().flat_map(|t| t.latencies_ns).collect();
    LoadResult { requests, elapsed, latencies_ns }
}

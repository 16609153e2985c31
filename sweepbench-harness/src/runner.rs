//! Trial runner: one server, every concurrency level, `trials` runs each.
//!
//! A sweep always stops its server before returning. When a run fails the
//! remaining levels are skipped, whatever finished is still summarized and
//! every short key is listed as missing data.

use std::fmt;
use sweepbench_common::{BenchError, ExperimentKey, SampleSet};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{RunSettings, ServerSpec};
use crate::driver::{ClientDriver, RunResult, ServerAddress};
use crate::server::{pick_free_port, ServerHandle};
use crate::table::{Metric, MissingData, ResultTable};

/// Sweep state machine. `Failed` is reachable from every other state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepState {
    Idle,
    ServerStarting,
    RunningTrials,
    Summarizing,
    Done,
    Failed,
}

impl fmt::Display for SweepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SweepState::Idle => "idle",
            SweepState::ServerStarting => "server-starting",
            SweepState::RunningTrials => "running-trials",
            SweepState::Summarizing => "summarizing",
            SweepState::Done => "done",
            SweepState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A sweep that ended in [`SweepState::Failed`]
#[derive(Debug, Error)]
#[error("sweep of {server} failed during {step}: {error}")]
pub struct SweepFailure {
    /// Variant name of the server being swept
    pub server: String,
    /// Key whose run failed, if the failure happened inside a run
    pub key: Option<ExperimentKey>,
    /// State the sweep was in when it failed
    pub step: SweepState,
    #[source]
    pub error: BenchError,
    /// Summaries of the trials that did complete, plus missing-data entries
    pub partial: ResultTable,
}

/// Samples gathered for one key
struct KeySamples {
    throughput: SampleSet,
    latency: SampleSet,
}

impl KeySamples {
    fn new(key: ExperimentKey) -> Self {
        Self { throughput: SampleSet::new(key.clone()), latency: SampleSet::new(key) }
    }

    /// Append one run. Nothing is appended when the run's latencies belong
    /// to another key.
    fn absorb(&mut self, run: RunResult) -> sweepbench_common::Result<()> {
        self.latency.merge(run.latencies)?;
        self.throughput.push(run.throughput);
        Ok(())
    }

    fn completed(&self) -> usize {
        self.throughput.len()
    }
}

/// Runs sweeps one server at a time with an explicit settings context
pub struct TrialRunner<D> {
    settings: RunSettings,
    driver: D,
    state: SweepState,
}

impl<D: ClientDriver> TrialRunner<D> {
    pub fn new(settings: RunSettings, driver: D) -> Self {
        Self { settings, driver, state: SweepState::Idle }
    }

    pub fn state(&self) -> SweepState {
        self.state
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    fn transition(&mut self, next: SweepState) {
        info!(from = %self.state, to = %next, "sweep state");
        self.state = next;
    }

    /// Start `spec`'s server, run every configured trial against it, stop it
    /// and summarize.
    pub async fn run_sweep(&mut self, spec: &ServerSpec) -> Result<ResultTable, SweepFailure> {
        self.state = SweepState::Idle;
        self.transition(SweepState::ServerStarting);

        let mut launched = match self.launch(spec).await {
            Ok(launched) => launched,
            Err(error) => return Err(self.fail(spec, None, error, ResultTable::new())),
        };
        let addr = ServerAddress::new(self.settings.host.clone(), launched.port);

        self.transition(SweepState::RunningTrials);
        let mut collected: Vec<KeySamples> = Vec::new();
        let outcome = self.run_trials(spec, &addr, &mut collected).await;

        // Stop unconditionally before looking at the outcome.
        if let Err(e) = launched.server.stop().await {
            warn!(server = %spec.name, "failed to stop server cleanly: {e}");
        }

        self.transition(SweepState::Summarizing);
        let reason = outcome.as_ref().err().map(|(_, e)| e.to_string());
        let table = match self.summarize(spec, &collected, reason.as_deref()) {
            Ok(table) => table,
            Err(error) => return Err(self.fail(spec, None, error, ResultTable::new())),
        };

        match outcome {
            Ok(()) => {
                self.transition(SweepState::Done);
                Ok(table)
            }
            Err((key, error)) => Err(self.fail(spec, Some(key), error, table)),
        }
    }

    async fn launch(&self, spec: &ServerSpec) -> sweepbench_common::Result<Launched> {
        let port = pick_free_port()?;
        let command = spec.server_command()?.with_port(port);
        info!(server = %spec.name, %command, "starting server");
        let server = ServerHandle::start(
            command,
            self.settings.readiness_delay,
            self.settings.stop_timeout,
        )
        .await?;
        Ok(Launched { server, port })
    }

    /// Run every level in order. Stops at the first failed run, returning its key.
    async fn run_trials(
        &self,
        spec: &ServerSpec,
        addr: &ServerAddress,
        collected: &mut Vec<KeySamples>,
    ) -> Result<(), (ExperimentKey, BenchError)> {
        for &concurrency in &self.settings.concurrency_levels {
            let key = spec.key(concurrency);
            let mut samples = KeySamples::new(key.clone());
            let outcome = self.run_level(addr, &key, &mut samples).await;
            collected.push(samples);
            outcome.map_err(|e| (key, e))?;
        }
        Ok(())
    }

    async fn run_level(
        &self,
        addr: &ServerAddress,
        key: &ExperimentKey,
        samples: &mut KeySamples,
    ) -> sweepbench_common::Result<()> {
        for trial in 1..=self.settings.trials {
            let run = self.driver.run(addr, key).await?;
            let (mean_us, median_us) = latency_digest(&run.latencies);
            info!(
                %key,
                trial,
                throughput = run.throughput,
                mean_latency_us = mean_us,
                median_latency_us = median_us,
                "trial complete"
            );
            samples.absorb(run)?;
        }
        Ok(())
    }

    fn summarize(
        &self,
        spec: &ServerSpec,
        collected: &[KeySamples],
        reason: Option<&str>,
    ) -> sweepbench_common::Result<ResultTable> {
        let level = self.settings.confidence_level;
        let expected = self.settings.trials;
        let mut table = ResultTable::new();

        for samples in collected {
            let key = samples.throughput.key();
            if !samples.throughput.is_empty() {
                let summary = samples.throughput.summarize(level)?;
                debug!(%key, mean = summary.mean, half_width = summary.half_width, "throughput");
                table.push_summary(key.clone(), Metric::Throughput, summary);
                table.push_raw(key, Metric::Throughput, samples.throughput.samples());
            }
            if !samples.latency.is_empty() {
                let summary = samples.latency.summarize(level)?;
                table.push_summary(key.clone(), Metric::Latency, summary);
                table.push_raw(key, Metric::Latency, samples.latency.samples());
            }
        }

        if let Some(reason) = reason {
            for &concurrency in &self.settings.concurrency_levels {
                let key = spec.key(concurrency);
                let completed = collected
                    .iter()
                    .find(|s| s.throughput.key() == &key)
                    .map(KeySamples::completed)
                    .unwrap_or(0);
                if completed < expected {
                    table.push_missing(MissingData {
                        key,
                        completed_trials: completed,
                        expected_trials: expected,
                        reason: reason.to_string(),
                    });
                }
            }
        }
        Ok(table)
    }

    fn fail(
        &mut self,
        spec: &ServerSpec,
        key: Option<ExperimentKey>,
        error: BenchError,
        partial: ResultTable,
    ) -> SweepFailure {
        let step = self.state;
        warn!(server = %spec.name, %step, "sweep failed: {error}");
        self.transition(SweepState::Failed);
        SweepFailure { server: spec.name.clone(), key, step, error, partial }
    }
}

struct Launched {
    server: ServerHandle,
    port: u16,
}

/// Mean and median of one run's latencies, 0 when none were recorded
fn latency_digest(latencies: &SampleSet) -> (f64, f64) {
    let samples = latencies.samples();
    (sweepbench_stats::mean(samples), sweepbench_stats::median(samples))
}

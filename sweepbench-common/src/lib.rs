use std::time::Duration;
use thiserror::Error;

pub use sweepbench_stats::{StatsError, Summary};

pub mod frame;
mod key;
mod report;
mod sample_set;

pub use key::ExperimentKey;
pub use report::{parse_report, ClientReport, ReportedRate};
pub use sample_set::SampleSet;

/// Largest frame (length prefix included) the echo server accepts.
pub const MAX_FRAME_SIZE: usize = 4096;

/// Size of the little-endian length prefix on every frame.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Request body each client worker sends unless configured otherwise.
pub const DEFAULT_PAYLOAD: [u8; 4] = [0x1, 0x2, 0x3, 0x4];

/// Errors surfaced by the benchmark orchestrator
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BenchError {
    #[error("Server failed to start ({command}): {reason}")]
    StartupFailure { command: String, reason: String },

    #[error("Client failure: {0}")]
    ClientFailure(String),

    #[error("Timed out after {after:?} waiting for {what}")]
    Timeout { what: String, after: Duration },

    #[error("Statistics error: {0}")]
    Stats(#[from] StatsError),

    #[error("Sample set for {expected} cannot absorb samples for {found}")]
    KeyMismatch { expected: String, found: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<std::io::Error> for BenchError {
    fn from(e: std::io::Error) -> Self {
        BenchError::Io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BenchError>;

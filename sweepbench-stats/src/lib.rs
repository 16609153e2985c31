#![warn(missing_docs)]
//! SweepBench statistical reduction engine
//!
//! Pure functions over numeric samples:
//! - Descriptive statistics (mean, median, sample standard deviation, extremes)
//! - Student's t CDF and its numerical inverse
//! - Summaries carrying a confidence half-width for the mean
//!
//! Nothing in this crate performs I/O or holds state.

mod descriptive;
mod student_t;
mod summary;

pub use descriptive::{max, mean, median, min, percentile, std_dev};
pub use student_t::{
    find_root, inverse_student_t, ln_gamma, regularized_incomplete_beta, standard_normal_cdf,
    student_t_cdf, ACCURACY, MAX_ITERATIONS, NORMAL_LIMIT_DF,
};
pub use summary::{confidence_half_width, summarize, Summary};

use thiserror::Error;

/// Default confidence level fed to the inverse t quantile
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;

/// Errors produced by the statistics routines
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StatsError {
    /// Too few samples for the requested statistic
    #[error("Insufficient samples: found {found}, need at least {required}")]
    InsufficientSamples {
        /// Number of samples available
        found: usize,
        /// Minimum number of samples required
        required: usize,
    },

    /// A numerical routine exceeded its iteration budget
    #[error("Failed to converge after {iterations} iterations")]
    ConvergenceFailure {
        /// Iterations performed before giving up
        iterations: usize,
    },

    /// Probability argument outside the open interval (0, 1)
    #[error("Probability must lie in (0, 1), got {0}")]
    InvalidProbability(f64),
}

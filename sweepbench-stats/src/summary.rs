//! Summary snapshots of a sample slice
//!
//! A [`Summary`] is always computed from scratch over the slice it is given;
//! there is no incremental update path.

use serde::{Deserialize, Serialize};

use crate::descriptive::{max, mean, median, min, std_dev};
use crate::student_t::inverse_student_t;
use crate::StatsError;

/// Point estimates and confidence half-width for one set of samples
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Number of samples summarized
    pub count: usize,
    /// Arithmetic mean
    pub mean: f64,
    /// Median
    pub median: f64,
    /// Sample standard deviation (n - 1 denominator)
    pub std_dev: f64,
    /// Smallest sample
    pub min: f64,
    /// Largest sample
    pub max: f64,
    /// Level passed to the t quantile
    pub confidence_level: f64,
    /// Distance from the mean to each confidence bound
    pub half_width: f64,
}

impl Summary {
    /// Lower confidence bound (`mean - half_width`)
    pub fn lower(&self) -> f64 {
        self.mean - self.half_width
    }

    /// Upper confidence bound (`mean + half_width`)
    pub fn upper(&self) -> f64 {
        self.mean + self.half_width
    }

    /// `true` when the interval is zero-width only because there were too few
    /// samples to estimate spread.
    pub fn interval_is_degenerate(&self) -> bool {
        self.count < 2
    }
}

/// Half-width of the confidence interval for the mean:
/// `t(level, n - 1) * stddev / sqrt(n)`.
///
/// A single sample yields 0.0 without consulting the t quantile.
pub fn confidence_half_width(samples: &[f64], level: f64) -> Result<f64, StatsError> {
    match samples.len() {
        0 => Err(StatsError::InsufficientSamples { found: 0, required: 1 }),
        1 => Ok(0.0),
        n => {
            let sd = std_dev(samples);
            if sd == 0.0 {
                return Ok(0.0);
            }
            let t = inverse_student_t(n - 1, level)?;
            Ok(t * sd / (n as f64).sqrt())
        }
    }
}

/// Summarize `samples` at the given confidence level.
pub fn summarize(samples: &[f64], level: f64) -> Result<Summary, StatsError> {
    if samples.is_empty() {
        return Err(StatsError::InsufficientSamples { found: 0, required: 1 });
    }
    if !(level > 0.0 && level < 1.0) {
        return Err(StatsError::InvalidProbability(level));
    }
    Ok(Summary {
        count: samples.len(),
        mean: mean(samples),
        median: median(samples),
        std_dev: std_dev(samples),
        min: min(samples),
        max: max(samples),
        confidence_level: level,
        half_width: confidence_half_width(samples, level)?,
    })
}

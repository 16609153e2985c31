use serde::{Deserialize, Serialize};
use sweepbench_stats::{summarize, Summary};

use crate::{BenchError, ExperimentKey, Result};

/// Append-only measurements sharing one [`ExperimentKey`].
///
/// Samples keep the order they were appended in, which is not necessarily
/// real-time order across workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSet {
    key: ExperimentKey,
    samples: Vec<f64>,
}

impl SampleSet {
    pub fn new(key: ExperimentKey) -> Self {
        Self { key, samples: Vec::new() }
    }

    pub fn with_samples(key: ExperimentKey, samples: Vec<f64>) -> Self {
        Self { key, samples }
    }

    pub fn key(&self) -> &ExperimentKey {
        &self.key
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn push(&mut self, sample: f64) {
        self.samples.push(sample);
    }

    pub fn extend(&mut self, samples: impl IntoIterator<Item = f64>) {
        self.samples.extend(samples);
    }

    /// Append every sample of `other`. Fails without appending anything if
    /// `other` belongs to a different key.
    pub fn merge(&mut self, other: SampleSet) -> Result<()> {
        if other.key != self.key {
            return Err(BenchError::KeyMismatch {
                expected: self.key.to_string(),
                found: other.key.to_string(),
            });
        }
        self.samples.extend(other.samples);
        Ok(())
    }

    /// Fresh summary of the current contents.
    pub fn summarize(&self, confidence_level: f64) -> Result<Summary> {
        Ok(summarize(&self.samples, confidence_level)?)
    }
}

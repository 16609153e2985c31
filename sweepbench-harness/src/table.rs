//! Summary and raw rows produced by sweeps, in the shape external exporters
//! (CSV writers, plotting scripts) consume.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::Path;
use sweepbench_common::{BenchError, ExperimentKey, Result, Summary};

/// What a row measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Requests per second, one sample per trial
    Throughput,
    /// Per-request latency in microseconds
    Latency,
}

impl Metric {
    pub fn units(&self) -> &'static str {
        match self {
            Metric::Throughput => "req/s",
            Metric::Latency => "us",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Throughput => write!(f, "throughput"),
            Metric::Latency => write!(f, "latency"),
        }
    }
}

/// One summarized configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub key: ExperimentKey,
    pub metric: Metric,
    pub summary: Summary,
}

impl SummaryRow {
    /// `(key fields..., mean, lower bound, upper bound)`
    pub fn export_fields(&self) -> Vec<String> {
        let mut fields = self.key.fields();
        fields.push(self.summary.mean.to_string());
        fields.push(self.summary.lower().to_string());
        fields.push(self.summary.upper().to_string());
        fields
    }
}

/// Every raw sample of one metric for one key, in recording order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSamples {
    pub key: ExperimentKey,
    pub metric: Metric,
    pub values: Vec<f64>,
}

impl RawSamples {
    /// One `(key fields..., value)` row per sample
    pub fn export_rows(&self) -> Vec<Vec<String>> {
        let key_fields = self.key.fields();
        self.values
            .iter()
            .map(|value| {
                let mut fields = key_fields.clone();
                fields.push(value.to_string());
                fields
            })
            .collect()
    }
}

/// A key that ended a sweep with fewer trials than configured
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingData {
    pub key: ExperimentKey,
    pub completed_trials: usize,
    pub expected_trials: usize,
    pub reason: String,
}

/// Display order for keys. Never affects how samples are grouped.
pub trait KeyOrdering {
    fn compare(&self, a: &ExperimentKey, b: &ExperimentKey) -> Ordering;
}

/// Derived `Ord` on [`ExperimentKey`]
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralOrder;

impl KeyOrdering for StructuralOrder {
    fn compare(&self, a: &ExperimentKey, b: &ExperimentKey) -> Ordering {
        a.cmp(b)
    }
}

/// Variants in the listed order, unlisted variants after them; ties fall back
/// to structural order.
#[derive(Debug, Clone, Default)]
pub struct LabelOrder(pub Vec<String>);

impl LabelOrder {
    fn rank(&self, variant: &str) -> usize {
        self.0.iter().position(|label| label == variant).unwrap_or(self.0.len())
    }
}

impl KeyOrdering for LabelOrder {
    fn compare(&self, a: &ExperimentKey, b: &ExperimentKey) -> Ordering {
        self.rank(&a.variant).cmp(&self.rank(&b.variant)).then_with(|| a.cmp(b))
    }
}

/// Everything a sweep (or several) produced
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    pub summaries: Vec<SummaryRow>,
    pub raw: Vec<RawSamples>,
    pub missing: Vec<MissingData>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty() && self.raw.is_empty() && self.missing.is_empty()
    }

    pub fn push_summary(&mut self, key: ExperimentKey, metric: Metric, summary: Summary) {
        self.summaries.push(SummaryRow { key, metric, summary });
    }

    /// Record `values` under `(key, metric)`, appending to an existing group
    pub fn push_raw(&mut self, key: &ExperimentKey, metric: Metric, values: &[f64]) {
        if values.is_empty() {
            return;
        }
        match self.raw.iter_mut().find(|group| &group.key == key && group.metric == metric) {
            Some(group) => group.values.extend_from_slice(values),
            None => self.raw.push(RawSamples { key: key.clone(), metric, values: values.to_vec() }),
        }
    }

    pub fn push_missing(&mut self, missing: MissingData) {
        self.missing.push(missing);
    }

    /// Append another table's rows (e.g. the next server's sweep)
    pub fn extend(&mut self, other: ResultTable) {
        self.summaries.extend(other.summaries);
        for group in other.raw {
            self.push_raw(&group.key, group.metric, &group.values);
        }
        self.missing.extend(other.missing);
    }

    pub fn summary(&self, key: &ExperimentKey, metric: Metric) -> Option<&Summary> {
        self.summaries
            .iter()
            .find(|row| &row.key == key && row.metric == metric)
            .map(|row| &row.summary)
    }

    pub fn raw_samples(&self, key: &ExperimentKey, metric: Metric) -> Option<&[f64]> {
        self.raw
            .iter()
            .find(|group| &group.key == key && group.metric == metric)
            .map(|group| group.values.as_slice())
    }

    /// Summary rows in display order, metric as the tie-breaker
    pub fn sorted(&self, ordering: &dyn KeyOrdering) -> Vec<&SummaryRow> {
        let mut rows: Vec<&SummaryRow> = self.summaries.iter().collect();
        rows.sort_by(|a, b| ordering.compare(&a.key, &b.key).then(a.metric.cmp(&b.metric)));
        rows
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| BenchError::Io(e.to_string()))
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

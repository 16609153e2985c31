use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifies one benchmark configuration.
///
/// Equality and `Ord` are structural: variant, then parameters in key order,
/// then concurrency. Display ordering for reports is decided elsewhere and
/// never changes how samples are grouped.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExperimentKey {
    /// Server implementation under test (e.g. `tokio-multi-thread`).
    pub variant: String,
    /// Extra configuration dimensions such as byte order or buffer size.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    /// Number of concurrent client workers.
    pub concurrency: u32,
}

impl ExperimentKey {
    pub fn new(variant: impl Into<String>, concurrency: u32) -> Self {
        Self { variant: variant.into(), params: BTreeMap::new(), concurrency }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Same configuration at a different concurrency level.
    pub fn at_concurrency(&self, concurrency: u32) -> Self {
        Self { concurrency, ..self.clone() }
    }

    /// Column names matching [`ExperimentKey::fields`].
    pub fn field_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.params.len() + 2);
        names.push("variant".to_string());
        names.extend(self.params.keys().cloned());
        names.push("concurrency".to_string());
        names
    }

    /// Key fields in export order: variant, parameter values, concurrency.
    pub fn fields(&self) -> Vec<String> {
        let mut fields = Vec::with_capacity(self.params.len() + 2);
        fields.push(self.variant.clone());
        fields.extend(self.params.values().cloned());
        fields.push(self.concurrency.to_string());
        fields
    }
}

impl fmt::Display for ExperimentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.variant)?;
        if !self.params.is_empty() {
            let params: Vec<String> =
                self.params.iter().map(|(k, v)| format!("{k}={v}")).collect();
            write!(f, "[{}]", params.join(","))?;
        }
        write!(f, " x{}", self.concurrency)
    }
}

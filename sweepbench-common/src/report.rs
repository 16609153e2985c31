use std::fmt;

use crate::{BenchError, Result};

/// Final summary line a client workload prints to stdout.
///
/// Formats as `"<n> requests in <ms> ms = <rate> msgs/s"`, followed by
/// `" average latency: <us> us"` when latencies were recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientReport {
    pub requests: u64,
    pub elapsed_ms: u64,
    pub average_latency_us: Option<f64>,
}

impl ClientReport {
    pub fn throughput(&self) -> f64 {
        if self.elapsed_ms == 0 {
            return 0.0;
        }
        self.requests as f64 / self.elapsed_ms as f64 * 1000.0
    }
}

impl fmt::Display for ClientReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} requests in {} ms = {:.3} msgs/s",
            self.requests,
            self.elapsed_ms,
            self.throughput()
        )?;
        if let Some(latency) = self.average_latency_us {
            write!(f, " average latency: {latency:.3} us")?;
        }
        Ok(())
    }
}

/// An event rate read back from a client's output.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportedRate {
    pub value: f64,
    /// Units token as printed, e.g. `msgs/s` or `reqs/s`.
    pub units: String,
}

/// Extract the throughput from a client's stdout.
///
/// Only the last non-empty line is considered. The rate is the first number
/// immediately followed by a token ending in `/s`.
pub fn parse_report(output: &str) -> Result<ReportedRate> {
    let line = output
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| BenchError::ClientFailure("client produced no output".to_string()))?;

    let tokens: Vec<&str> = line.split_whitespace().collect();
    tokens
        .windows(2)
        .find_map(|pair| {
            let units = pair[1];
            if !units.ends_with("/s") {
                return None;
            }
            pair[0].parse::<f64>().ok().filter(|v| v.is_finite()).map(|value| ReportedRate {
                value,
                units: units.to_string(),
            })
        })
        .ok_or_else(|| BenchError::ClientFailure(format!("no throughput in client output: {line:?}")))
}

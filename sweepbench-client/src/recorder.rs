use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Per-worker latency buffer.
///
/// Unbounded by default. With a capacity it keeps a uniform random sample of
/// everything recorded (reservoir sampling), so memory stays fixed however
/// long the run is.
pub struct LatencyRecorder {
    capacity: Option<usize>,
    seen: u64,
    samples: Vec<u64>,
    rng: StdRng,
}

impl LatencyRecorder {
    pub fn new(capacity: Option<usize>) -> Self {
        Self::with_rng(capacity, StdRng::from_entropy())
    }

    pub fn with_rng(capacity: Option<usize>, rng: StdRng) -> Self {
        let initial = capacity.unwrap_or(0).min(1 << 16);
        Self { capacity, seen: 0, samples: Vec::with_capacity(initial), rng }
    }

    pub fn record(&mut self, latency: Duration) {
        self.record_ns(latency.as_nanos().min(u64::MAX as u128) as u64);
    }

    pub fn record_ns(&mut self, latency_ns: u64) {
        self.seen += 1;
        match self.capacity {
            Some(cap) if self.samples.len() >= cap => {
                let slot = self.rng.gen_range(0..self.seen);
                if slot < cap as u64 {
                    self.samples[slot as usize] = latency_ns;
                }
            }
            _ => self.samples.push(latency_ns),
        }
    }

    /// Total latencies offered, kept or not.
    pub fn seen(&self) -> u64 {
        self.seen
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn into_samples(self) -> Vec<u64> {
        self.samples
    }
}

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// One resource sample from the telemetry provider. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricsSample {
    /// Unix time in seconds
    pub timestamp: f64,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    /// MB
    pub memory_used: u64,
    /// MB
    pub memory_total: u64,
    pub disk_percent: f64,
    /// GB
    pub disk_used: u64,
    /// GB
    pub disk_total: u64,
    /// MB sent since boot
    #[serde(default)]
    pub network_sent: u64,
    /// MB received since boot
    #[serde(default)]
    pub network_recv: u64,
    #[serde(default)]
    pub gpu_utilization: Option<f64>,
    #[serde(default)]
    pub gpu_memory_used: Option<u64>,
    #[serde(default)]
    pub gpu_memory_total: Option<u64>,
    /// °C
    #[serde(default)]
    pub temperature: Option<f64>,
}

pub fn unix_now() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Fixed-capacity, arrival-ordered sample store. Appending to a full buffer
/// evicts the oldest sample.
#[derive(Debug, Clone)]
pub struct MetricsHistory {
    samples: VecDeque<MetricsSample>,
    capacity: usize,
}

impl MetricsHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Enough room to answer a `retention` window at one sample per `cadence`.
    pub fn for_retention(retention: Duration, cadence: Duration) -> Self {
        let cadence = cadence.as_secs_f64().max(0.001);
        Self::new((retention.as_secs_f64() / cadence).ceil() as usize)
    }

    pub fn append(&mut self, sample: MetricsSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn latest(&self) -> Option<&MetricsSample> {
        self.samples.back()
    }

    /// Samples no older than `window`, oldest first.
    pub fn history(&self, window: Duration) -> Vec<MetricsSample> {
        self.history_at(window, unix_now())
    }

    pub fn history_at(&self, window: Duration, now: f64) -> Vec<MetricsSample> {
        let cutoff = now - window.as_secs_f64();
        self.samples
            .iter()
            .filter(|s| s.timestamp >= cutoff)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

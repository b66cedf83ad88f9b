use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::history::MetricsSample;
use crate::error::ThresholdError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Warning,
    Critical,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Warning => "warning",
            AlertLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Monitored resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    Cpu,
    Memory,
    Disk,
    Gpu,
    Temperature,
}

impl Component {
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Cpu => "cpu",
            Component::Memory => "memory",
            Component::Disk => "disk",
            Component::Gpu => "gpu",
            Component::Temperature => "temperature",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Component::Cpu => "CPU usage",
            Component::Memory => "Memory usage",
            Component::Disk => "Disk usage",
            Component::Gpu => "GPU usage",
            Component::Temperature => "Temperature",
        }
    }

    fn unit(&self) -> &'static str {
        match self {
            Component::Temperature => "°C",
            _ => "%",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: u64,
    pub level: AlertLevel,
    pub component: Component,
    pub message: String,
    pub timestamp: f64,
    pub value: f64,
    pub threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub warning: f64,
    pub critical: f64,
}

impl Threshold {
    pub const fn new(warning: f64, critical: f64) -> Self {
        Self { warning, critical }
    }

    /// Level and crossed threshold for `value`, if any.
    pub fn classify(&self, value: f64) -> Option<(AlertLevel, f64)> {
        if value >= self.critical {
            Some((AlertLevel::Critical, self.critical))
        } else if value >= self.warning {
            Some((AlertLevel::Warning, self.warning))
        } else {
            None
        }
    }
}

/// Warning/critical pairs per monitored resource.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSet {
    #[serde(default = "default_cpu")]
    pub cpu: Threshold,
    #[serde(default = "default_memory")]
    pub memory: Threshold,
    #[serde(default = "default_disk")]
    pub disk: Threshold,
    #[serde(default = "default_gpu")]
    pub gpu: Threshold,
    #[serde(default = "default_temperature")]
    pub temperature: Threshold,
}

fn default_cpu() -> Threshold {
    Threshold::new(75.0, 90.0)
}

fn default_memory() -> Threshold {
    Threshold::new(80.0, 90.0)
}

fn default_disk() -> Threshold {
    Threshold::new(85.0, 95.0)
}

fn default_gpu() -> Threshold {
    Threshold::new(85.0, 95.0)
}

fn default_temperature() -> Threshold {
    Threshold::new(75.0, 85.0)
}

impl Default for ThresholdSet {
    fn default() -> Self {
        Self {
            cpu: default_cpu(),
            memory: default_memory(),
            disk: default_disk(),
            gpu: default_gpu(),
            temperature: default_temperature(),
        }
    }
}

impl ThresholdSet {
    pub fn get(&self, component: Component) -> Threshold {
        match component {
            Component::Cpu => self.cpu,
            Component::Memory => self.memory,
            Component::Disk => self.disk,
            Component::Gpu => self.gpu,
            Component::Temperature => self.temperature,
        }
    }

    fn entries(&self) -> [(Component, Threshold); 5] {
        [
            (Component::Cpu, self.cpu),
            (Component::Memory, self.memory),
            (Component::Disk, self.disk),
            (Component::Gpu, self.gpu),
            (Component::Temperature, self.temperature),
        ]
    }

    /// Percentages must lie in 0-100, temperatures must be non-negative and
    /// every critical threshold must be at least its warning threshold.
    pub fn validate(&self) -> Result<(), ThresholdError> {
        for (component, threshold) in self.entries() {
            let max = match component {
                Component::Temperature => f64::MAX,
                _ => 100.0,
            };
            for value in [threshold.warning, threshold.critical] {
                if !value.is_finite() || value < 0.0 || value > max {
                    return Err(ThresholdError::OutOfRange {
                        component: component.as_str(),
                        value,
                    });
                }
            }
            if threshold.critical < threshold.warning {
                return Err(ThresholdError::Inverted {
                    component: component.as_str(),
                    warning: threshold.warning,
                    critical: threshold.critical,
                });
            }
        }
        Ok(())
    }
}

/// Resources the sample actually reports, in evaluation order.
pub fn readings(sample: &MetricsSample) -> Vec<(Component, f64)> {
    let mut readings = vec![
        (Component::Cpu, sample.cpu_percent),
        (Component::Memory, sample.memory_percent),
        (Component::Disk, sample.disk_percent),
    ];
    if let Some(gpu) = sample.gpu_utilization {
        readings.push((Component::Gpu, gpu));
    }
    if let Some(temperature) = sample.temperature {
        readings.push((Component::Temperature, temperature));
    }
    readings
}

/// Keeps the active alert set.
///
/// At most one alert is active per component. Each pass only touches the
/// components present in the sample: a breach replaces the component's prior
/// alert, a reading below warning clears it.
///
/// Dismissal suppresses the component until it clears. While suppressed, a
/// breach at or below the dismissed level stays silent; escalating past the
/// dismissed level raises a new alert and lifts the suppression.
#[derive(Debug, Default)]
pub struct AlertEvaluator {
    active: Vec<Alert>,
    suppressed: HashMap<Component, AlertLevel>,
    next_id: u64,
}

impl AlertEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> &[Alert] {
        &self.active
    }

    /// Evaluate `sample` and return the new active set.
    pub fn evaluate(&mut self, sample: &MetricsSample, thresholds: &ThresholdSet) -> Vec<Alert> {
        let readings = readings(sample);
        let mut fired: HashMap<Component, (AlertLevel, f64, f64)> = HashMap::new();

        for &(component, value) in &readings {
            match thresholds.get(component).classify(value) {
                None => {
                    if self.suppressed.remove(&component).is_some() {
                        tracing::debug!(component = component.as_str(), "Suppression lifted");
                    }
                }
                Some((level, threshold)) => {
                    match self.suppressed.get(&component).copied() {
                        Some(dismissed) if level <= dismissed => continue,
                        Some(_) => {
                            self.suppressed.remove(&component);
                        }
                        None => {}
                    }
                    fired.insert(component, (level, value, threshold));
                }
            }
        }

        let reported = |c: Component| readings.iter().any(|(r, _)| *r == c);
        let mut next = Vec::with_capacity(self.active.len() + fired.len());

        for alert in self.active.drain(..) {
            if !reported(alert.component) {
                next.push(alert);
                continue;
            }
            if let Some((level, value, threshold)) = fired.remove(&alert.component) {
                let id = if level == alert.level {
                    alert.id
                } else {
                    self.next_id += 1;
                    self.next_id
                };
                next.push(build(id, alert.component, level, value, threshold, sample.timestamp));
            }
        }

        for &(component, _) in &readings {
            if let Some((level, value, threshold)) = fired.remove(&component) {
                self.next_id += 1;
                let alert = build(self.next_id, component, level, value, threshold, sample.timestamp);
                tracing::warn!(component = component.as_str(), level = level.as_str(), "{}", alert.message);
                next.push(alert);
            }
        }

        self.active = next;
        self.active.clone()
    }

    /// Remove the alert with `id`. Returns false if no such alert is active.
    pub fn dismiss(&mut self, id: u64) -> bool {
        match self.active.iter().position(|a| a.id == id) {
            Some(index) => self.dismiss_index(index),
            None => false,
        }
    }

    /// Remove the alert at `index` in the active list.
    pub fn dismiss_index(&mut self, index: usize) -> bool {
        if index >= self.active.len() {
            return false;
        }
        let alert = self.active.remove(index);
        self.suppressed.insert(alert.component, alert.level);
        tracing::info!(component = alert.component.as_str(), id = alert.id, "Alert dismissed");
        true
    }
}

fn build(
    id: u64,
    component: Component,
    level: AlertLevel,
    value: f64,
    threshold: f64,
    timestamp: f64,
) -> Alert {
    let severity = match level {
        AlertLevel::Critical => "critical",
        AlertLevel::Warning => "high",
    };
    Alert {
        id,
        level,
        component,
        message: format!(
            "{} {}: {:.1}{}",
            component.label(),
            severity,
            value,
            component.unit()
        ),
        timestamp,
        value,
        threshold,
    }
}

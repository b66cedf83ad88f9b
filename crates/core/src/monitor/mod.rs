//! Resource metrics and threshold alerts.
//!
//! Telemetry samples land in a [`MetricsHistory`] ring buffer and are run
//! through the [`AlertEvaluator`] against the current [`ThresholdSet`].

pub mod alerts;
pub mod history;
pub mod telemetry;

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub use alerts::{Alert, AlertEvaluator, AlertLevel, Component, Threshold, ThresholdSet};
pub use history::{MetricsHistory, MetricsSample};
pub use telemetry::{HttpTelemetrySource, TelemetrySource};

use crate::error::ThresholdError;

#[derive(Debug, Clone, Serialize)]
pub struct AlertCounts {
    pub total: usize,
    pub critical: usize,
    pub warning: usize,
    /// Up to five most recent alerts
    pub recent: Vec<Alert>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorSummary {
    pub current: Option<MetricsSample>,
    pub alerts: AlertCounts,
    pub thresholds: ThresholdSet,
    pub samples_retained: usize,
}

pub struct PerformanceMonitor {
    history: RwLock<MetricsHistory>,
    evaluator: RwLock<AlertEvaluator>,
    thresholds: RwLock<ThresholdSet>,
}

impl PerformanceMonitor {
    pub fn new(history: MetricsHistory, thresholds: ThresholdSet) -> Self {
        Self {
            history: RwLock::new(history),
            evaluator: RwLock::new(AlertEvaluator::new()),
            thresholds: RwLock::new(thresholds),
        }
    }

    /// Store `sample` and re-evaluate alerts. Returns the new active set.
    pub async fn ingest(&self, sample: MetricsSample) -> Vec<Alert> {
        let thresholds = *self.thresholds.read().await;
        let active = self.evaluator.write().await.evaluate(&sample, &thresholds);
        self.history.write().await.append(sample);
        active
    }

    pub async fn latest(&self) -> Option<MetricsSample> {
        self.history.read().await.latest().cloned()
    }

    pub async fn history(&self, window: Duration) -> Vec<MetricsSample> {
        self.history.read().await.history(window)
    }

    pub async fn active_alerts(&self, level: Option<AlertLevel>) -> Vec<Alert> {
        self.evaluator
            .read()
            .await
            .active()
            .iter()
            .filter(|a| level.map_or(true, |l| a.level == l))
            .cloned()
            .collect()
    }

    pub async fn dismiss(&self, id: u64) -> bool {
        self.evaluator.write().await.dismiss(id)
    }

    pub async fn dismiss_index(&self, index: usize) -> bool {
        self.evaluator.write().await.dismiss_index(index)
    }

    pub async fn thresholds(&self) -> ThresholdSet {
        *self.thresholds.read().await
    }

    /// Replace the threshold set wholesale. An invalid set is rejected and the
    /// current one stays in effect.
    pub async fn update_thresholds(&self, thresholds: ThresholdSet) -> Result<(), ThresholdError> {
        thresholds.validate()?;
        *self.thresholds.write().await = thresholds;
        tracing::info!("Alert thresholds updated");
        Ok(())
    }

    pub async fn summary(&self) -> MonitorSummary {
        let (current, samples_retained) = {
            let history = self.history.read().await;
            (history.latest().cloned(), history.len())
        };
        let active = self.active_alerts(None).await;
        let critical = active.iter().filter(|a| a.level == AlertLevel::Critical).count();
        let recent = active[active.len().saturating_sub(5)..].to_vec();

        MonitorSummary {
            current,
            alerts: AlertCounts {
                total: active.len(),
                critical,
                warning: active.len() - critical,
                recent,
            },
            thresholds: self.thresholds().await,
            samples_retained,
        }
    }

    /// Pull a sample from `source` every `every`. Failed pulls are logged and
    /// skipped.
    pub fn spawn_ingestion(
        self: &Arc<Self>,
        source: Arc<dyn TelemetrySource>,
        every: Duration,
    ) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match source.sample().await {
                    Ok(sample) => {
                        let active = monitor.ingest(sample).await;
                        tracing::debug!(alerts = active.len(), "Telemetry sample ingested");
                    }
                    Err(e) => tracing::warn!("Telemetry fetch failed: {}", e),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn monitor() -> PerformanceMonitor {
        PerformanceMonitor::new(MetricsHistory::new(8), ThresholdSet::default())
    }

    fn sample(cpu: f64) -> MetricsSample {
        MetricsSample {
            timestamp: history::unix_now(),
            cpu_percent: cpu,
            memory_percent: 40.0,
            disk_percent: 50.0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn ingest_stores_and_evaluates() {
        let monitor = monitor();
        let active = monitor.ingest(sample(95.0)).await;
        assert_eq!(active.len(), 1);
        assert_eq!(monitor.latest().await.unwrap().cpu_percent, 95.0);
        assert_eq!(monitor.history(Duration::from_secs(60)).await.len(), 1);

        let summary = monitor.summary().await;
        assert_eq!(summary.alerts.total, 1);
        assert_eq!(summary.alerts.critical, 1);
        assert_eq!(summary.alerts.recent.len(), 1);
        assert_eq!(summary.samples_retained, 1);
    }

    #[tokio::test]
    async fn rejected_update_keeps_previous_thresholds() {
        let monitor = monitor();
        let mut bad = ThresholdSet::default();
        bad.cpu = Threshold::new(80.0, 60.0);

        assert!(monitor.update_thresholds(bad).await.is_err());
        assert_eq!(monitor.thresholds().await, ThresholdSet::default());

        let mut good = ThresholdSet::default();
        good.cpu = Threshold::new(20.0, 30.0);
        monitor.update_thresholds(good).await.unwrap();
        let active = monitor.ingest(sample(25.0)).await;
        assert_eq!(active[0].level, AlertLevel::Warning);
    }

    #[tokio::test]
    async fn alerts_filter_by_level() {
        let monitor = monitor();
        let mut s = sample(80.0);
        s.memory_percent = 95.0;
        monitor.ingest(s).await;

        assert_eq!(monitor.active_alerts(None).await.len(), 2);
        let critical = monitor.active_alerts(Some(AlertLevel::Critical)).await;
        assert_eq!(critical.len(), 1);
        assert_eq!(critical[0].component, Component::Memory);
    }

    struct FlakySource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TelemetrySource for FlakySource {
        async fn sample(&self) -> Result<MetricsSample, SourceError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
                Err(SourceError::Unavailable("sensor busy".into()))
            } else {
                Ok(sample(10.0))
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ingestion_loop_survives_failures() {
        let monitor = Arc::new(monitor());
        let handle = monitor.spawn_ingestion(
            Arc::new(FlakySource {
                calls: AtomicUsize::new(0),
            }),
            Duration::from_secs(30),
        );

        tokio::time::sleep(Duration::from_secs(125)).await;
        handle.abort();

        // Ticks at 0, 30, 60, 90, 120: every other one succeeds.
        assert_eq!(monitor.summary().await.samples_retained, 2);
    }
}

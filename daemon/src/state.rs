use anyhow::Result;
use modelctl_core::downloaders::{ArtifactSource, HttpArtifactSource};
use modelctl_core::monitor::MetricsHistory;
use modelctl_core::{Config, DownloadOrchestrator, ModelRegistry, PerformanceMonitor};
use modelctl_runtime_api::{HttpRuntime, Runtime};
use std::sync::Arc;

use crate::loader::LoadCoordinator;

pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    pub downloads: DownloadOrchestrator,
    pub loader: LoadCoordinator,
    pub monitor: Arc<PerformanceMonitor>,
}

impl AppState {
    /// Wire the components around a shared registry.
    pub fn new(
        registry: Arc<ModelRegistry>,
        source: Arc<dyn ArtifactSource>,
        runtime: Arc<dyn Runtime>,
        config: &Config,
    ) -> Self {
        let history =
            MetricsHistory::for_retention(config.monitor.retention(), config.monitor.sample_interval());

        Self {
            downloads: DownloadOrchestrator::new(
                registry.clone(),
                source,
                config.downloads.settings(),
            ),
            loader: LoadCoordinator::new(registry.clone(), runtime),
            monitor: Arc::new(PerformanceMonitor::new(history, config.thresholds)),
            registry,
        }
    }

    /// State backed by the HTTP artifact and runtime services named in `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let source = HttpArtifactSource::new(&config.downloads.service_url)?;
        let runtime = HttpRuntime::new(&config.runtime.service_url)?;

        Ok(Self::new(
            Arc::new(ModelRegistry::with_catalog()),
            Arc::new(source),
            Arc::new(runtime),
            config,
        ))
    }
}

//! Load/unload coordination against the model runtime.
//!
//! The registry status brackets every runtime call: `downloaded -> loading`
//! before a load and `loading -> loaded | downloaded` after it. Runtime calls
//! run on their own task so a caller that goes away mid-call cannot leave a
//! model stranded in `loading`.
//!
//! Models left loaded longer than the configured idle limit are unloaded by
//! [`LoadCoordinator::unload_idle`] through the regular unload path.

use modelctl_core::{ModelFilter, ModelRegistry, ModelStatus, RegistryError};
use modelctl_runtime_api::{Runtime, RuntimeError, RuntimeStatus};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Model '{0}' not found")]
    NotFound(String),

    #[error("Model '{id}' is {status}, expected {expected}")]
    InvalidState {
        id: String,
        status: ModelStatus,
        expected: ModelStatus,
    },

    #[error("Failed to load '{id}': {source}")]
    LoadFailure {
        id: String,
        #[source]
        source: RuntimeError,
    },

    #[error("Failed to unload '{id}': {source}")]
    UnloadFailure {
        id: String,
        #[source]
        source: RuntimeError,
    },

    #[error("Runtime call for '{0}' was interrupted")]
    Interrupted(String),

    #[error("Runtime status unavailable: {0}")]
    StatusUnavailable(#[source] RuntimeError),
}

impl LoadError {
    fn from_registry(err: RegistryError, expected: ModelStatus) -> Self {
        match err {
            RegistryError::NotFound(id) => LoadError::NotFound(id),
            RegistryError::Conflict { id, current, .. } => LoadError::InvalidState {
                id,
                status: current,
                expected,
            },
        }
    }
}

/// Serializes load/unload per model. Cheap to clone.
#[derive(Clone)]
pub struct LoadCoordinator {
    registry: Arc<ModelRegistry>,
    runtime: Arc<dyn Runtime>,
    unloading: Arc<Mutex<HashSet<String>>>,
    loaded_at: Arc<Mutex<HashMap<String, Instant>>>,
}

impl LoadCoordinator {
    pub fn new(registry: Arc<ModelRegistry>, runtime: Arc<dyn Runtime>) -> Self {
        Self {
            registry,
            runtime,
            unloading: Arc::new(Mutex::new(HashSet::new())),
            loaded_at: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Load a `downloaded` model. A failed runtime load returns the model to
    /// `downloaded`; it does not need to be fetched again.
    pub async fn load(&self, model_id: &str) -> Result<(), LoadError> {
        let model = self
            .registry
            .transition(
                model_id,
                &[ModelStatus::Downloaded],
                ModelStatus::Loading,
                None,
            )
            .await
            .map_err(|e| LoadError::from_registry(e, ModelStatus::Downloaded))?;

        let this = self.clone();
        let id = model_id.to_string();
        tokio::spawn(async move {
            tracing::info!(model = %id, "Loading model");
            let result = this.runtime.load(&model).await;

            let next = if result.is_ok() {
                ModelStatus::Loaded
            } else {
                ModelStatus::Downloaded
            };
            match this
                .registry
                .transition(&id, &[ModelStatus::Loading], next, None)
                .await
            {
                Ok(_) if next == ModelStatus::Loaded => {
                    this.loaded_at.lock().await.insert(id.clone(), Instant::now());
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(model = %id, "Post-load transition rejected: {}", e),
            }

            result.map_err(|source| {
                tracing::error!(model = %id, "Load failed: {}", source);
                LoadError::LoadFailure { id, source }
            })
        })
        .await
        .map_err(|_| LoadError::Interrupted(model_id.to_string()))?
    }

    /// Unload a `loaded` model. On runtime failure it stays `loaded`.
    pub async fn unload(&self, model_id: &str) -> Result<(), LoadError> {
        {
            let mut unloading = self.unloading.lock().await;
            let model = self
                .registry
                .get(model_id)
                .await
                .map_err(|e| LoadError::from_registry(e, ModelStatus::Loaded))?;

            if model.status != ModelStatus::Loaded || unloading.contains(model_id) {
                return Err(LoadError::InvalidState {
                    id: model_id.to_string(),
                    status: model.status,
                    expected: ModelStatus::Loaded,
                });
            }
            unloading.insert(model_id.to_string());
        }

        let this = self.clone();
        let id = model_id.to_string();
        let result = tokio::spawn(async move {
            tracing::info!(model = %id, "Unloading model");
            let result = this.runtime.unload(&id).await;

            let outcome = match result {
                Ok(()) => this
                    .registry
                    .transition(&id, &[ModelStatus::Loaded], ModelStatus::Downloaded, None)
                    .await
                    .map(|_| ())
                    .map_err(|e| LoadError::from_registry(e, ModelStatus::Loaded)),
                Err(source) => {
                    tracing::error!(model = %id, "Unload failed: {}", source);
                    Err(LoadError::UnloadFailure {
                        id: id.clone(),
                        source,
                    })
                }
            };

            if outcome.is_ok() {
                this.loaded_at.lock().await.remove(&id);
            }
            this.unloading.lock().await.remove(&id);
            outcome
        })
        .await;

        result.map_err(|_| LoadError::Interrupted(model_id.to_string()))?
    }

    /// Unload every model loaded for at least `max_age`. Returns the ids that
    /// were unloaded; failures are logged and the model stays `loaded`.
    pub async fn unload_idle(&self, max_age: Duration) -> Vec<String> {
        let mut idle: Vec<String> = self
            .loaded_at
            .lock()
            .await
            .iter()
            .filter(|(_, at)| at.elapsed() >= max_age)
            .map(|(id, _)| id.clone())
            .collect();
        idle.sort();

        let mut unloaded = Vec::new();
        for id in idle {
            match self.unload(&id).await {
                Ok(()) => unloaded.push(id),
                // No longer loaded through us; stop tracking it
                Err(LoadError::InvalidState { status, .. }) if status != ModelStatus::Loaded => {
                    self.loaded_at.lock().await.remove(&id);
                }
                Err(e) => tracing::warn!(model = %id, "Idle unload failed: {}", e),
            }
        }

        if !unloaded.is_empty() {
            tracing::info!("Unloaded {} idle model(s)", unloaded.len());
        }
        unloaded
    }

    /// Run [`Self::unload_idle`] every `every`.
    pub fn spawn_idle_unloader(&self, max_age: Duration, every: Duration) -> JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                coordinator.unload_idle(max_age).await;
            }
        })
    }

    pub async fn runtime_status(&self) -> Result<RuntimeStatus, LoadError> {
        self.runtime
            .status()
            .await
            .map_err(LoadError::StatusUnavailable)
    }

    /// Ids of every model currently `loaded`.
    pub async fn loaded(&self) -> Vec<String> {
        let filter = ModelFilter {
            status: Some(ModelStatus::Loaded),
            ..Default::default()
        };
        self.registry
            .list(&filter)
            .await
            .into_iter()
            .map(|m| m.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use modelctl_core::ModelRecord;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct FakeRuntime {
        fail: AtomicBool,
        slow: bool,
        held: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Runtime for FakeRuntime {
        async fn load(&self, model: &ModelRecord) -> Result<(), RuntimeError> {
            if self.slow {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(RuntimeError::Rejected("out of memory".into()));
            }
            self.held.lock().unwrap().push(model.id.clone());
            Ok(())
        }

        async fn unload(&self, model_id: &str) -> Result<(), RuntimeError> {
            if self.slow {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(RuntimeError::Rejected("busy".into()));
            }
            self.held.lock().unwrap().retain(|id| id != model_id);
            Ok(())
        }

        async fn status(&self) -> Result<RuntimeStatus, RuntimeError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(RuntimeError::Rejected("status offline".into()));
            }
            Ok(RuntimeStatus {
                loaded_models: self.held.lock().unwrap().clone(),
                memory_used_mb: 2000,
                gpu_memory_used_mb: None,
            })
        }
    }

    async fn setup(runtime: FakeRuntime) -> (Arc<ModelRegistry>, Arc<FakeRuntime>, LoadCoordinator) {
        let registry = Arc::new(ModelRegistry::with_catalog());
        registry
            .transition("gpt2", &[ModelStatus::Available], ModelStatus::Downloaded, None)
            .await
            .unwrap();
        let runtime = Arc::new(runtime);
        let coordinator = LoadCoordinator::new(registry.clone(), runtime.clone());
        (registry, runtime, coordinator)
    }

    #[tokio::test]
    async fn load_then_unload() {
        let (registry, _, coordinator) = setup(FakeRuntime::default()).await;

        coordinator.load("gpt2").await.unwrap();
        assert_eq!(registry.get("gpt2").await.unwrap().status, ModelStatus::Loaded);
        assert_eq!(coordinator.loaded().await, vec!["gpt2".to_string()]);

        coordinator.unload("gpt2").await.unwrap();
        assert_eq!(
            registry.get("gpt2").await.unwrap().status,
            ModelStatus::Downloaded
        );
        assert!(coordinator.loaded().await.is_empty());
    }

    #[tokio::test]
    async fn load_requires_downloaded() {
        let (registry, _, coordinator) = setup(FakeRuntime::default()).await;

        let err = coordinator.load("distilgpt2").await.unwrap_err();
        assert!(matches!(
            err,
            LoadError::InvalidState {
                status: ModelStatus::Available,
                ..
            }
        ));
        assert_eq!(
            registry.get("distilgpt2").await.unwrap().status,
            ModelStatus::Available
        );
        assert!(matches!(
            coordinator.load("missing").await,
            Err(LoadError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn failed_load_reverts_to_downloaded() {
        let runtime = FakeRuntime::default();
        runtime.fail.store(true, Ordering::SeqCst);
        let (registry, _, coordinator) = setup(runtime).await;

        let err = coordinator.load("gpt2").await.unwrap_err();
        assert!(matches!(err, LoadError::LoadFailure { .. }));
        assert_eq!(
            registry.get("gpt2").await.unwrap().status,
            ModelStatus::Downloaded
        );
    }

    #[tokio::test]
    async fn failed_unload_stays_loaded() {
        let (registry, runtime, coordinator) = setup(FakeRuntime::default()).await;
        coordinator.load("gpt2").await.unwrap();

        runtime.fail.store(true, Ordering::SeqCst);
        let err = coordinator.unload("gpt2").await.unwrap_err();
        assert!(matches!(err, LoadError::UnloadFailure { .. }));
        assert_eq!(registry.get("gpt2").await.unwrap().status, ModelStatus::Loaded);

        runtime.fail.store(false, Ordering::SeqCst);
        coordinator.unload("gpt2").await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_loads_are_serialized() {
        let (registry, _, coordinator) = setup(FakeRuntime {
            slow: true,
            ..Default::default()
        })
        .await;

        let (a, b) = tokio::join!(coordinator.load("gpt2"), coordinator.load("gpt2"));
        let oks = [&a, &b].iter().filter(|r| r.is_ok()).count();
        let invalid = [&a, &b]
            .iter()
            .filter(|r| {
                matches!(
                    r,
                    Err(LoadError::InvalidState {
                        status: ModelStatus::Loading,
                        ..
                    })
                )
            })
            .count();
        assert_eq!((oks, invalid), (1, 1));
        assert_eq!(registry.get("gpt2").await.unwrap().status, ModelStatus::Loaded);
    }

    #[tokio::test]
    async fn concurrent_unloads_are_serialized() {
        let (_, _, coordinator) = setup(FakeRuntime {
            slow: true,
            ..Default::default()
        })
        .await;
        coordinator.load("gpt2").await.unwrap();

        let (a, b) = tokio::join!(coordinator.unload("gpt2"), coordinator.unload("gpt2"));
        assert_eq!([&a, &b].iter().filter(|r| r.is_ok()).count(), 1);
        assert!([&a, &b]
            .iter()
            .any(|r| matches!(r, Err(LoadError::InvalidState { .. }))));
    }

    #[tokio::test]
    async fn unload_requires_loaded() {
        let (_, _, coordinator) = setup(FakeRuntime::default()).await;
        assert!(matches!(
            coordinator.unload("gpt2").await,
            Err(LoadError::InvalidState {
                status: ModelStatus::Downloaded,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn runtime_status_passes_through() {
        let (_, runtime, coordinator) = setup(FakeRuntime::default()).await;
        coordinator.load("gpt2").await.unwrap();

        let status = coordinator.runtime_status().await.unwrap();
        assert_eq!(status.loaded_models, vec!["gpt2".to_string()]);
        assert_eq!(status.memory_used_mb, 2000);

        runtime.fail.store(true, Ordering::SeqCst);
        assert!(matches!(
            coordinator.runtime_status().await,
            Err(LoadError::StatusUnavailable(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_models_are_unloaded() {
        let (registry, _, coordinator) = setup(FakeRuntime::default()).await;
        let hour = Duration::from_secs(3600);
        coordinator.load("gpt2").await.unwrap();

        tokio::time::advance(Duration::from_secs(30 * 60)).await;
        assert!(coordinator.unload_idle(hour).await.is_empty());
        assert_eq!(registry.get("gpt2").await.unwrap().status, ModelStatus::Loaded);

        tokio::time::advance(Duration::from_secs(31 * 60)).await;
        assert_eq!(coordinator.unload_idle(hour).await, vec!["gpt2".to_string()]);
        assert_eq!(
            registry.get("gpt2").await.unwrap().status,
            ModelStatus::Downloaded
        );
        assert!(coordinator.unload_idle(hour).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn reload_restarts_idle_clock() {
        let (registry, _, coordinator) = setup(FakeRuntime::default()).await;
        let hour = Duration::from_secs(3600);

        coordinator.load("gpt2").await.unwrap();
        tokio::time::advance(Duration::from_secs(50 * 60)).await;
        coordinator.unload("gpt2").await.unwrap();
        coordinator.load("gpt2").await.unwrap();

        tokio::time::advance(Duration::from_secs(20 * 60)).await;
        assert!(coordinator.unload_idle(hour).await.is_empty());
        assert_eq!(registry.get("gpt2").await.unwrap().status, ModelStatus::Loaded);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_idle_unload_keeps_model_loaded() {
        let (registry, runtime, coordinator) = setup(FakeRuntime::default()).await;
        let hour = Duration::from_secs(3600);
        coordinator.load("gpt2").await.unwrap();

        tokio::time::advance(Duration::from_secs(2 * 3600)).await;
        runtime.fail.store(true, Ordering::SeqCst);
        assert!(coordinator.unload_idle(hour).await.is_empty());
        assert_eq!(registry.get("gpt2").await.unwrap().status, ModelStatus::Loaded);

        runtime.fail.store(false, Ordering::SeqCst);
        assert_eq!(coordinator.unload_idle(hour).await, vec!["gpt2".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_unloader_runs_periodically() {
        let (registry, _, coordinator) = setup(FakeRuntime::default()).await;
        coordinator.load("gpt2").await.unwrap();

        let handle =
            coordinator.spawn_idle_unloader(Duration::from_secs(3600), Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(3700)).await;
        handle.abort();

        assert_eq!(
            registry.get("gpt2").await.unwrap().status,
            ModelStatus::Downloaded
        );
        assert!(coordinator.loaded().await.is_empty());
    }
}

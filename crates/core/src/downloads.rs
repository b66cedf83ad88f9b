//! Download orchestration.
//!
//! One [`DownloadTask`] exists per model while its status is `downloading`.
//! The task owns a tokio poll loop that asks the [`ArtifactSource`] for
//! progress on a fixed cadence and resolves the download as success or
//! failure exactly once. A wall-clock deadline races the poll loop, so a slow
//! or hung progress source cannot stretch a download past its budget.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::downloaders::{ArtifactSource, ProgressInfo, ProgressReport};
use crate::error::{DownloadError, RegistryError};
use crate::models::ModelStatus;
use crate::registry::ModelRegistry;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone)]
pub struct DownloadSettings {
    pub poll_interval: Duration,
    pub timeout: Duration,
    /// Cap on downloads in flight across all models. `None` is unbounded.
    pub max_concurrent: Option<usize>,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(600),
            max_concurrent: None,
        }
    }
}

/// Snapshot of an in-flight download.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadProgress {
    pub model_id: String,
    pub total_bytes: u64,
    pub downloaded_bytes: u64,
    pub progress: f32,
    /// MB/s
    pub speed: f64,
    /// Seconds remaining, 0 when unknown
    pub eta: f64,
    pub elapsed_secs: f64,
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Completed,
    Failed,
    TimedOut,
}

struct DownloadTask {
    /// Distinguishes this task from earlier tasks for the same model.
    generation: u64,
    started: Instant,
    poll: Option<JoinHandle<()>>,
    downloaded_bytes: u64,
    total_bytes: u64,
    progress: f32,
    speed: f64,
    eta: f64,
    message: String,
}

impl DownloadTask {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            started: Instant::now(),
            poll: None,
            downloaded_bytes: 0,
            total_bytes: 0,
            progress: 0.0,
            speed: 0.0,
            eta: 0.0,
            message: "Queued".to_string(),
        }
    }

    fn record(&mut self, info: &ProgressInfo) {
        self.downloaded_bytes = info.downloaded_bytes;
        self.total_bytes = info.total_bytes;
        self.progress = info.progress.clamp(0.0, 100.0);

        let elapsed = self.started.elapsed().as_secs_f64();
        self.speed = if info.speed > 0.0 {
            info.speed
        } else if elapsed > 0.0 {
            info.downloaded_bytes as f64 / BYTES_PER_MB / elapsed
        } else {
            0.0
        };
        self.eta = if info.eta > 0.0 {
            info.eta
        } else if self.speed > 0.0 {
            let remaining = info.total_bytes.saturating_sub(info.downloaded_bytes);
            remaining as f64 / BYTES_PER_MB / self.speed
        } else {
            0.0
        };
        self.message = format!("Downloading ({:.1}%)", self.progress);
    }

    fn snapshot(&self, model_id: &str) -> DownloadProgress {
        DownloadProgress {
            model_id: model_id.to_string(),
            total_bytes: self.total_bytes,
            downloaded_bytes: self.downloaded_bytes,
            progress: self.progress,
            speed: self.speed,
            eta: self.eta,
            elapsed_secs: self.started.elapsed().as_secs_f64(),
            status: self.message.clone(),
        }
    }
}

struct Inner {
    registry: Arc<ModelRegistry>,
    source: Arc<dyn ArtifactSource>,
    settings: DownloadSettings,
    tasks: Mutex<HashMap<String, DownloadTask>>,
    next_generation: AtomicU64,
}

/// Drives downloads against the registry. Cheap to clone.
#[derive(Clone)]
pub struct DownloadOrchestrator {
    inner: Arc<Inner>,
}

impl DownloadOrchestrator {
    pub fn new(
        registry: Arc<ModelRegistry>,
        source: Arc<dyn ArtifactSource>,
        settings: DownloadSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                source,
                settings,
                tasks: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Accept a download for `model_id` and start polling it.
    ///
    /// Models that are `available` or in `error` can be downloaded. A second
    /// call while a task exists returns [`DownloadError::AlreadyInProgress`]
    /// without side effects.
    pub async fn start_download(&self, model_id: &str) -> Result<(), DownloadError> {
        let (generation, deadline) = {
            let mut tasks = self.inner.tasks.lock().await;
            if tasks.contains_key(model_id) {
                return Err(DownloadError::AlreadyInProgress(model_id.to_string()));
            }
            if let Some(limit) = self.inner.settings.max_concurrent {
                if tasks.len() >= limit {
                    return Err(DownloadError::LimitReached(tasks.len()));
                }
            }

            self.inner
                .registry
                .transition(
                    model_id,
                    &[ModelStatus::Available, ModelStatus::Error],
                    ModelStatus::Downloading,
                    Some(0.0),
                )
                .await
                .map_err(|e| match e {
                    RegistryError::NotFound(id) => DownloadError::NotFound(id),
                    RegistryError::Conflict {
                        id,
                        current: ModelStatus::Downloading,
                        ..
                    } => DownloadError::AlreadyInProgress(id),
                    RegistryError::Conflict { id, current, .. } => DownloadError::InvalidState {
                        id,
                        status: current,
                    },
                })?;

            let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
            let task = DownloadTask::new(generation);
            let deadline = task.started + self.inner.settings.timeout;
            tasks.insert(model_id.to_string(), task);
            (generation, deadline)
        };

        if let Err(e) = self.inner.source.request_download(model_id).await {
            tracing::error!(model = model_id, "Artifact source rejected download: {}", e);
            self.inner.resolve(model_id, generation, Outcome::Failed).await;
            return Err(e.into());
        }

        // The task may have been torn down while the request was in flight.
        let mut tasks = self.inner.tasks.lock().await;
        let Some(task) = tasks
            .get_mut(model_id)
            .filter(|task| task.generation == generation)
        else {
            tracing::warn!(model = model_id, "Download cancelled before polling started");
            return Err(DownloadError::Cancelled(model_id.to_string()));
        };

        task.poll = Some(tokio::spawn(Inner::run(
            self.inner.clone(),
            model_id.to_string(),
            generation,
            deadline,
        )));

        tracing::info!(model = model_id, "Download accepted");
        Ok(())
    }

    /// Progress of an in-flight download, `None` once resolved.
    pub async fn progress(&self, model_id: &str) -> Option<DownloadProgress> {
        self.inner
            .tasks
            .lock()
            .await
            .get(model_id)
            .map(|task| task.snapshot(model_id))
    }

    pub async fn is_active(&self, model_id: &str) -> bool {
        self.inner.tasks.lock().await.contains_key(model_id)
    }

    pub async fn active(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.tasks.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Abort every poll loop. Interrupted models go back to `available`.
    pub async fn shutdown(&self) {
        let mut tasks = self.inner.tasks.lock().await;

        for (model_id, task) in tasks.drain() {
            if let Some(handle) = task.poll {
                handle.abort();
            }
            let _ = self
                .inner
                .registry
                .transition(
                    &model_id,
                    &[ModelStatus::Downloading],
                    ModelStatus::Available,
                    None,
                )
                .await;
            tracing::info!(model = %model_id, "Download interrupted by shutdown");
        }
    }
}

impl Inner {
    async fn run(self: Arc<Self>, model_id: String, generation: u64, deadline: Instant) {
        let outcome = tokio::select! {
            outcome = self.poll_until_terminal(&model_id, generation) => outcome,
            _ = tokio::time::sleep_until(deadline) => Outcome::TimedOut,
        };
        self.resolve(&model_id, generation, outcome).await;
    }

    async fn poll_until_terminal(&self, model_id: &str, generation: u64) -> Outcome {
        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match self.source.query_progress(model_id).await {
                Ok(ProgressReport::Known(info)) => {
                    tracing::debug!(model = model_id, progress = info.progress, "Poll");
                    if !self.record_progress(model_id, generation, &info).await {
                        // Resolved elsewhere while we were waiting on the source.
                        return Outcome::Failed;
                    }
                    if info.progress >= 100.0 {
                        return Outcome::Completed;
                    }
                }
                Ok(ProgressReport::Absent) => match self.source.query_model_status(model_id).await {
                    Ok(status) if status.is_downloaded() => return Outcome::Completed,
                    Ok(ModelStatus::Error) => return Outcome::Failed,
                    Ok(status) => {
                        tracing::debug!(model = model_id, "No progress yet, source reports {}", status)
                    }
                    Err(e) => tracing::warn!(model = model_id, "Status query failed: {}", e),
                },
                Err(e) => tracing::warn!(model = model_id, "Progress query failed: {}", e),
            }
        }
    }

    /// Update counters and registry progress. Returns false if the task is gone.
    ///
    /// Registry writes made on behalf of a download happen under the task
    /// lock, so the task map and the `downloading` status change together.
    async fn record_progress(&self, model_id: &str, generation: u64, info: &ProgressInfo) -> bool {
        let mut tasks = self.tasks.lock().await;
        match tasks.get_mut(model_id) {
            Some(task) if task.generation == generation => task.record(info),
            _ => return false,
        }

        if let Err(e) = self
            .registry
            .transition(
                model_id,
                &[ModelStatus::Downloading],
                ModelStatus::Downloading,
                Some(info.progress),
            )
            .await
        {
            tracing::warn!(model = model_id, "Dropping progress update: {}", e);
        }
        true
    }

    /// Terminal resolution. Whoever removes the task performs the transition;
    /// later calls for the same download, or for a superseded one, are no-ops.
    async fn resolve(&self, model_id: &str, generation: u64, outcome: Outcome) {
        let mut tasks = self.tasks.lock().await;
        if tasks.get(model_id).map(|t| t.generation) != Some(generation) {
            return;
        }
        let Some(task) = tasks.remove(model_id) else {
            return;
        };
        let elapsed = task.started.elapsed();

        let result = match outcome {
            Outcome::Completed => {
                tracing::info!(model = model_id, ?elapsed, "Download completed");
                self.registry
                    .transition(
                        model_id,
                        &[ModelStatus::Downloading],
                        ModelStatus::Downloaded,
                        Some(100.0),
                    )
                    .await
            }
            Outcome::Failed | Outcome::TimedOut => {
                if outcome == Outcome::TimedOut {
                    tracing::error!(model = model_id, ?elapsed, "Download timed out");
                } else {
                    tracing::error!(model = model_id, ?elapsed, "Download failed");
                }
                self.registry
                    .transition(model_id, &[ModelStatus::Downloading], ModelStatus::Error, None)
                    .await
            }
        };

        if let Err(e) = result {
            tracing::warn!(model = model_id, "Resolution transition rejected: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Plays back scripted progress replies, then answers `Absent` forever.
    struct ScriptedSource {
        progress: std::sync::Mutex<VecDeque<Result<ProgressReport, SourceError>>>,
        status: ModelStatus,
        reject_requests: bool,
        polls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<ProgressReport, SourceError>>) -> Self {
            Self {
                progress: std::sync::Mutex::new(script.into()),
                status: ModelStatus::Downloading,
                reject_requests: false,
                polls: AtomicUsize::new(0),
            }
        }

        fn with_status(mut self, status: ModelStatus) -> Self {
            self.status = status;
            self
        }
    }

    #[async_trait]
    impl ArtifactSource for ScriptedSource {
        async fn request_download(&self, _model_id: &str) -> Result<(), SourceError> {
            if self.reject_requests {
                return Err(SourceError::Unavailable("fetch service down".into()));
            }
            Ok(())
        }

        async fn query_progress(&self, _model_id: &str) -> Result<ProgressReport, SourceError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            self.progress
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(ProgressReport::Absent))
        }

        async fn query_model_status(&self, _model_id: &str) -> Result<ModelStatus, SourceError> {
            Ok(self.status)
        }
    }

    /// Never answers a progress query.
    struct HungSource;

    #[async_trait]
    impl ArtifactSource for HungSource {
        async fn request_download(&self, _model_id: &str) -> Result<(), SourceError> {
            Ok(())
        }

        async fn query_progress(&self, _model_id: &str) -> Result<ProgressReport, SourceError> {
            std::future::pending().await
        }

        async fn query_model_status(&self, _model_id: &str) -> Result<ModelStatus, SourceError> {
            std::future::pending().await
        }
    }

    /// Blocks `request_download` until a permit is released, then reports
    /// nothing but `Absent`.
    struct GatedRequest {
        gate: tokio::sync::Semaphore,
        polls: AtomicUsize,
    }

    impl GatedRequest {
        fn new() -> Self {
            Self {
                gate: tokio::sync::Semaphore::new(0),
                polls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ArtifactSource for GatedRequest {
        async fn request_download(&self, _model_id: &str) -> Result<(), SourceError> {
            self.gate.acquire().await.unwrap().forget();
            Ok(())
        }

        async fn query_progress(&self, _model_id: &str) -> Result<ProgressReport, SourceError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            Ok(ProgressReport::Absent)
        }

        async fn query_model_status(&self, _model_id: &str) -> Result<ModelStatus, SourceError> {
            Ok(ModelStatus::Downloading)
        }
    }

    fn gated() -> (Arc<GatedRequest>, Arc<ModelRegistry>, DownloadOrchestrator) {
        let source = Arc::new(GatedRequest::new());
        let registry = Arc::new(ModelRegistry::with_catalog());
        let orchestrator =
            DownloadOrchestrator::new(registry.clone(), source.clone(), DownloadSettings::default());
        (source, registry, orchestrator)
    }

    fn spawn_start(
        orchestrator: &DownloadOrchestrator,
        model_id: &'static str,
    ) -> JoinHandle<Result<(), DownloadError>> {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.start_download(model_id).await })
    }

    async fn wait_until_active(orchestrator: &DownloadOrchestrator, model_id: &str) {
        while !orchestrator.is_active(model_id).await {
            tokio::task::yield_now().await;
        }
    }

    fn known(progress: f32) -> Result<ProgressReport, SourceError> {
        Ok(ProgressReport::Known(ProgressInfo {
            progress,
            speed: 0.0,
            eta: 0.0,
            downloaded_bytes: (progress as u64) * 1024 * 1024,
            total_bytes: 100 * 1024 * 1024,
        }))
    }

    fn orchestrator(source: impl ArtifactSource + 'static) -> (Arc<ModelRegistry>, DownloadOrchestrator) {
        let registry = Arc::new(ModelRegistry::with_catalog());
        let orchestrator = DownloadOrchestrator::new(
            registry.clone(),
            Arc::new(source),
            DownloadSettings::default(),
        );
        (registry, orchestrator)
    }

    async fn wait_until_resolved(orchestrator: &DownloadOrchestrator, model_id: &str) {
        for _ in 0..2_000 {
            if !orchestrator.is_active(model_id).await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        panic!("download of {model_id} never resolved");
    }

    #[tokio::test(start_paused = true)]
    async fn progress_sequence_ends_downloaded() {
        let (registry, orchestrator) =
            orchestrator(ScriptedSource::new(vec![known(0.0), known(25.0), known(60.0), known(100.0)]));

        orchestrator.start_download("gpt2").await.unwrap();
        wait_until_resolved(&orchestrator, "gpt2").await;

        let model = registry.get("gpt2").await.unwrap();
        assert_eq!(model.status, ModelStatus::Downloaded);
        assert_eq!(model.download_progress, 100.0);
        assert!(orchestrator.progress("gpt2").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_is_rejected() {
        let (registry, orchestrator) = orchestrator(ScriptedSource::new(vec![]));

        let (a, b) = tokio::join!(
            orchestrator.start_download("gpt2"),
            orchestrator.start_download("gpt2")
        );
        let accepted = [&a, &b].iter().filter(|r| r.is_ok()).count();
        let rejected = [&a, &b]
            .iter()
            .filter(|r| matches!(r, Err(DownloadError::AlreadyInProgress(_))))
            .count();
        assert_eq!((accepted, rejected), (1, 1));

        assert_eq!(orchestrator.active().await, vec!["gpt2".to_string()]);
        assert_eq!(
            registry.get("gpt2").await.unwrap().status,
            ModelStatus::Downloading
        );
    }

    #[tokio::test(start_paused = true)]
    async fn absent_progress_times_out_as_error() {
        let (registry, orchestrator) = orchestrator(ScriptedSource::new(vec![]));

        orchestrator.start_download("distilgpt2").await.unwrap();
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(orchestrator.is_active("distilgpt2").await);
        assert_eq!(
            registry.get("distilgpt2").await.unwrap().status,
            ModelStatus::Downloading
        );

        wait_until_resolved(&orchestrator, "distilgpt2").await;
        assert_eq!(
            registry.get("distilgpt2").await.unwrap().status,
            ModelStatus::Error
        );
    }

    #[tokio::test(start_paused = true)]
    async fn hung_source_cannot_extend_timeout() {
        let (registry, orchestrator) = orchestrator(HungSource);
        let started = Instant::now();

        orchestrator.start_download("gpt2").await.unwrap();
        wait_until_resolved(&orchestrator, "gpt2").await;

        assert!(started.elapsed() < Duration::from_secs(602));
        assert_eq!(registry.get("gpt2").await.unwrap().status, ModelStatus::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn absent_progress_falls_back_to_status() {
        let source = ScriptedSource::new(vec![known(30.0)]).with_status(ModelStatus::Downloaded);
        let (registry, orchestrator) = orchestrator(source);

        orchestrator.start_download("gpt2").await.unwrap();
        wait_until_resolved(&orchestrator, "gpt2").await;

        let model = registry.get("gpt2").await.unwrap();
        assert_eq!(model.status, ModelStatus::Downloaded);
        assert_eq!(model.download_progress, 100.0);
    }

    #[tokio::test(start_paused = true)]
    async fn reported_error_fails_download() {
        let source = ScriptedSource::new(vec![known(10.0)]).with_status(ModelStatus::Error);
        let (registry, orchestrator) = orchestrator(source);

        orchestrator.start_download("gpt2").await.unwrap();
        wait_until_resolved(&orchestrator, "gpt2").await;

        assert_eq!(registry.get("gpt2").await.unwrap().status, ModelStatus::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_keep_polling() {
        let source = ScriptedSource::new(vec![
            Err(SourceError::Unavailable("connection reset".into())),
            known(50.0),
            Err(SourceError::Status {
                service: "artifact service",
                status: 503,
            }),
            known(100.0),
        ]);
        let (registry, orchestrator) = orchestrator(source);

        orchestrator.start_download("gpt2").await.unwrap();
        wait_until_resolved(&orchestrator, "gpt2").await;

        assert_eq!(
            registry.get("gpt2").await.unwrap().status,
            ModelStatus::Downloaded
        );
    }

    #[tokio::test(start_paused = true)]
    async fn progress_snapshot_tracks_counters() {
        let (registry, orchestrator) = orchestrator(ScriptedSource::new(vec![known(40.0)]));

        orchestrator.start_download("gpt2").await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let progress = orchestrator.progress("gpt2").await.unwrap();
        assert_eq!(progress.progress, 40.0);
        assert_eq!(progress.downloaded_bytes, 40 * 1024 * 1024);
        assert_eq!(progress.total_bytes, 100 * 1024 * 1024);
        assert_eq!(registry.get("gpt2").await.unwrap().download_progress, 40.0);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_request_marks_error() {
        let mut source = ScriptedSource::new(vec![]);
        source.reject_requests = true;
        let (registry, orchestrator) = orchestrator(source);

        let err = orchestrator.start_download("gpt2").await.unwrap_err();
        assert!(matches!(err, DownloadError::Source(_)));
        assert!(!orchestrator.is_active("gpt2").await);
        assert_eq!(registry.get("gpt2").await.unwrap().status, ModelStatus::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_download_can_be_retried() {
        let source = ScriptedSource::new(vec![known(10.0)]).with_status(ModelStatus::Error);
        let (registry, orchestrator) = orchestrator(source);

        orchestrator.start_download("gpt2").await.unwrap();
        wait_until_resolved(&orchestrator, "gpt2").await;
        assert_eq!(registry.get("gpt2").await.unwrap().status, ModelStatus::Error);

        orchestrator.start_download("gpt2").await.unwrap();
        assert_eq!(
            registry.get("gpt2").await.unwrap().status,
            ModelStatus::Downloading
        );
    }

    #[tokio::test]
    async fn unknown_and_downloaded_models_are_rejected() {
        let (registry, orchestrator) = orchestrator(ScriptedSource::new(vec![]));

        assert!(matches!(
            orchestrator.start_download("missing").await,
            Err(DownloadError::NotFound(_))
        ));

        registry
            .transition("gpt2", &[ModelStatus::Available], ModelStatus::Downloaded, None)
            .await
            .unwrap();
        assert!(matches!(
            orchestrator.start_download("gpt2").await,
            Err(DownloadError::InvalidState {
                status: ModelStatus::Downloaded,
                ..
            })
        ));
        assert!(orchestrator.active().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_limit_is_enforced() {
        let registry = Arc::new(ModelRegistry::with_catalog());
        let orchestrator = DownloadOrchestrator::new(
            registry,
            Arc::new(ScriptedSource::new(vec![])),
            DownloadSettings {
                max_concurrent: Some(1),
                ..Default::default()
            },
        );

        orchestrator.start_download("gpt2").await.unwrap();
        assert!(matches!(
            orchestrator.start_download("distilgpt2").await,
            Err(DownloadError::LimitReached(1))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn status_and_task_stay_in_step() {
        let (registry, orchestrator) =
            orchestrator(ScriptedSource::new(vec![known(5.0), known(50.0), known(100.0)]));

        orchestrator.start_download("gpt2").await.unwrap();
        for _ in 0..10 {
            let downloading = registry.get("gpt2").await.unwrap().status == ModelStatus::Downloading;
            assert_eq!(downloading, orchestrator.is_active("gpt2").await);
            tokio::time::sleep(Duration::from_millis(400)).await;
        }
        assert_eq!(
            registry.get("gpt2").await.unwrap().status,
            ModelStatus::Downloaded
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_aborts_polls() {
        let source = ScriptedSource::new(vec![known(10.0)]);
        let (registry, orchestrator) = orchestrator(source);

        orchestrator.start_download("gpt2").await.unwrap();
        orchestrator.shutdown().await;

        assert!(orchestrator.active().await.is_empty());
        assert_eq!(
            registry.get("gpt2").await.unwrap().status,
            ModelStatus::Available
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_during_request_cancels_start() {
        let (source, registry, orchestrator) = gated();

        let starting = spawn_start(&orchestrator, "gpt2");
        wait_until_active(&orchestrator, "gpt2").await;
        orchestrator.shutdown().await;
        source.gate.add_permits(1);

        let result = starting.await.unwrap();
        assert!(matches!(result, Err(DownloadError::Cancelled(_))));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(source.polls.load(Ordering::SeqCst), 0);
        assert!(orchestrator.active().await.is_empty());
        assert_eq!(
            registry.get("gpt2").await.unwrap().status,
            ModelStatus::Available
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stale_start_leaves_newer_download_alone() {
        let (source, registry, orchestrator) = gated();

        let first = spawn_start(&orchestrator, "gpt2");
        wait_until_active(&orchestrator, "gpt2").await;
        orchestrator.shutdown().await;

        let second = spawn_start(&orchestrator, "gpt2");
        wait_until_active(&orchestrator, "gpt2").await;
        source.gate.add_permits(2);

        assert!(matches!(
            first.await.unwrap(),
            Err(DownloadError::Cancelled(_))
        ));
        second.await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(orchestrator.active().await, vec!["gpt2".to_string()]);
        assert!(source.polls.load(Ordering::SeqCst) > 0);
        assert_eq!(
            registry.get("gpt2").await.unwrap().status,
            ModelStatus::Downloading
        );
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_counts_from_acceptance() {
        let (source, registry, orchestrator) = gated();
        let started = Instant::now();

        let starting = spawn_start(&orchestrator, "gpt2");
        wait_until_active(&orchestrator, "gpt2").await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        source.gate.add_permits(1);
        starting.await.unwrap().unwrap();

        wait_until_resolved(&orchestrator, "gpt2").await;
        assert!(started.elapsed() < Duration::from_secs(601));
        assert_eq!(registry.get("gpt2").await.unwrap().status, ModelStatus::Error);
    }
}

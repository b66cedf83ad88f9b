pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::models::ModelStatus;

/// Progress of a download as reported by the artifact service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProgressInfo {
    /// 0-100
    pub progress: f32,
    /// MB/s
    #[serde(default)]
    pub speed: f64,
    /// Seconds remaining
    #[serde(default)]
    pub eta: f64,
    #[serde(default)]
    pub downloaded_bytes: u64,
    #[serde(default)]
    pub total_bytes: u64,
}

/// Answer to a progress query.
///
/// `Absent` means the service has no record for the model. That can be
/// "not started yet", "already finished" or "unknown", so callers must fall
/// back to [`ArtifactSource::query_model_status`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressReport {
    Known(ProgressInfo),
    Absent,
}

/// External service that fetches model artifacts.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    async fn request_download(&self, model_id: &str) -> Result<(), SourceError>;

    async fn query_progress(&self, model_id: &str) -> Result<ProgressReport, SourceError>;

    async fn query_model_status(&self, model_id: &str) -> Result<ModelStatus, SourceError>;
}

pub use http::HttpArtifactSource;

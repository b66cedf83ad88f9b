//! modelctl_runtime_api - Runtime API trait and types
//!
//! This crate defines the contract for the external service that loads
//! models into memory, plus an HTTP client for it.

use async_trait::async_trait;
use modelctl_core::ModelRecord;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// What the runtime needs to place a model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadRequest {
    pub model_id: String,
    pub huggingface_repo: Option<String>,
    pub memory_requirement_mb: u64,
    pub vram_requirement_mb: Option<u64>,
    pub use_gpu: bool,
}

impl LoadRequest {
    pub fn for_model(model: &ModelRecord) -> Self {
        Self {
            model_id: model.id.clone(),
            huggingface_repo: model.huggingface_repo.clone(),
            memory_requirement_mb: model.memory_requirement_mb,
            vram_requirement_mb: model.vram_requirement_mb,
            use_gpu: model.vram_requirement_mb.is_some(),
        }
    }
}

/// What the runtime reports about itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeStatus {
    /// Models the runtime currently holds in memory
    #[serde(default)]
    pub loaded_models: Vec<String>,
    #[serde(default)]
    pub memory_used_mb: u64,
    #[serde(default)]
    pub gpu_memory_used_mb: Option<u64>,
}

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Runtime unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Runtime refused: {0}")]
    Rejected(String),
}

/// The external model runtime. Every call may block on network I/O.
#[async_trait]
pub trait Runtime: Send + Sync {
    async fn load(&self, model: &ModelRecord) -> Result<(), RuntimeError>;

    async fn unload(&self, model_id: &str) -> Result<(), RuntimeError>;

    async fn status(&self) -> Result<RuntimeStatus, RuntimeError>;
}

/// [`Runtime`] reached over HTTP: `POST {base}/models/load`,
/// `POST {base}/models/unload` and `GET {base}/status`.
pub struct HttpRuntime {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct UnloadRequest<'a> {
    model_id: &'a str,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    detail: String,
}

impl HttpRuntime {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("modelctl/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, RuntimeError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body: ErrorBody = response.json().await.unwrap_or_default();
        let detail = if body.detail.is_empty() {
            status.to_string()
        } else {
            body.detail
        };
        Err(RuntimeError::Rejected(detail))
    }
}

#[async_trait]
impl Runtime for HttpRuntime {
    async fn load(&self, model: &ModelRecord) -> Result<(), RuntimeError> {
        let url = format!("{}/models/load", self.base_url);
        tracing::debug!(model = %model.id, "Requesting runtime load");
        let response = self
            .client
            .post(&url)
            .json(&LoadRequest::for_model(model))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn unload(&self, model_id: &str) -> Result<(), RuntimeError> {
        let url = format!("{}/models/unload", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&UnloadRequest { model_id })
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn status(&self) -> Result<RuntimeStatus, RuntimeError> {
        let url = format!("{}/status", self.base_url);
        let response = self.client.get(&url).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }
}

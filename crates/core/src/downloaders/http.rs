use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{ArtifactSource, ProgressInfo, ProgressReport};
use crate::error::SourceError;
use crate::models::ModelStatus;

const SERVICE: &str = "artifact service";

/// [`ArtifactSource`] backed by the artifact-fetch service's REST API.
///
/// - `POST {base}/downloads` with `{"model_id": ..}` starts a download
/// - `GET {base}/downloads/{id}` returns progress, 404 when it has none
/// - `GET {base}/models/{id}/status` returns `{"status": ..}`
pub struct HttpArtifactSource {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct DownloadRequest<'a> {
    model_id: &'a str,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: ModelStatus,
}

impl HttpArtifactSource {
    pub fn new(base_url: &str) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(concat!("modelctl/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ArtifactSource for HttpArtifactSource {
    async fn request_download(&self, model_id: &str) -> Result<(), SourceError> {
        let url = format!("{}/downloads", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&DownloadRequest { model_id })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SourceError::Status {
                service: SERVICE,
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }

    async fn query_progress(&self, model_id: &str) -> Result<ProgressReport, SourceError> {
        let url = format!("{}/downloads/{}", self.base_url, model_id);
        let response = self.client.get(&url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::NO_CONTENT => Ok(ProgressReport::Absent),
            status if status.is_success() => {
                let info: Option<ProgressInfo> = response.json().await?;
                Ok(info.map_or(ProgressReport::Absent, ProgressReport::Known))
            }
            status => Err(SourceError::Status {
                service: SERVICE,
                status: status.as_u16(),
            }),
        }
    }

    async fn query_model_status(&self, model_id: &str) -> Result<ModelStatus, SourceError> {
        let url = format!("{}/models/{}/status", self.base_url, model_id);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(SourceError::Status {
                service: SERVICE,
                status: response.status().as_u16(),
            });
        }

        let body: StatusResponse = response.json().await?;
        Ok(body.status)
    }
}

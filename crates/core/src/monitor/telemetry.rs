use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::history::MetricsSample;
use crate::error::SourceError;

/// Provider of resource samples. Hardware sampling itself happens elsewhere.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    async fn sample(&self) -> Result<MetricsSample, SourceError>;
}

/// Pulls the current sample as JSON from `GET {url}`.
pub struct HttpTelemetrySource {
    client: Client,
    url: String,
}

impl HttpTelemetrySource {
    pub fn new(url: &str) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(concat!("modelctl/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl TelemetrySource for HttpTelemetrySource {
    async fn sample(&self) -> Result<MetricsSample, SourceError> {
        let response = self.client.get(&self.url).send().await?;

        if !response.status().is_success() {
            return Err(SourceError::Status {
                service: "telemetry provider",
                status: response.status().as_u16(),
            });
        }

        Ok(response.json().await?)
    }
}

//! Thin HTTP client for the daemon API

use anyhow::{Context, Result};
use modelctl_core::Config;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Non-success answer from the daemon.
#[derive(Debug)]
pub struct ApiFailure {
    pub status: StatusCode,
    pub message: String,
}

impl std::fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.status)
    }
}

impl std::error::Error for ApiFailure {}

pub struct DaemonClient {
    client: Client,
    base_url: String,
}

impl DaemonClient {
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("modelctl/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(330))
            .build()?;

        Ok(Self {
            client,
            base_url: format!("http://{}:{}", config.daemon.host, config.daemon.port),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check daemon health via HTTP
    pub async fn is_healthy(&self) -> bool {
        match self
            .client
            .get(self.url("/health"))
            .timeout(Duration::from_secs(2))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(self.client.get(self.url(path))).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.send(self.client.post(self.url(path)).json(body)).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await.with_context(|| {
            format!(
                "Could not reach the daemon at {}. Run `modelctl serve` to start it.",
                self.base_url
            )
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorResponse>().await {
                Ok(body) => body.error.message,
                Err(_) => status.canonical_reason().unwrap_or("request failed").to_string(),
            };
            return Err(ApiFailure { status, message }.into());
        }

        Ok(response.json().await?)
    }
}

/// The daemon answered with `status`.
pub fn is_status(err: &anyhow::Error, status: StatusCode) -> bool {
    err.downcast_ref::<ApiFailure>()
        .map_or(false, |f| f.status == status)
}

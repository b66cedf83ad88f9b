use thiserror::Error;

use crate::models::ModelStatus;

/// Errors returned by [`crate::registry::ModelRegistry`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Model '{0}' not found")]
    NotFound(String),

    #[error("Model '{id}' is {current}, cannot move to {to}")]
    Conflict {
        id: String,
        current: ModelStatus,
        to: ModelStatus,
    },
}

/// Errors returned by [`crate::downloads::DownloadOrchestrator::start_download`].
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Model '{0}' not found")]
    NotFound(String),

    #[error("Download of '{0}' already in progress")]
    AlreadyInProgress(String),

    #[error("Model '{id}' is {status}, only available or failed models can be downloaded")]
    InvalidState { id: String, status: ModelStatus },

    #[error("Download of '{0}' was cancelled before it started")]
    Cancelled(String),

    #[error("Download limit reached ({0} in flight)")]
    LimitReached(usize),

    #[error("Artifact source rejected download: {0}")]
    Source(#[from] SourceError),
}

/// Failures talking to an external collaborator (artifact service, telemetry
/// provider, runtime). Always treated as transient by background loops.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{service} returned HTTP {status}")]
    Status { service: &'static str, status: u16 },

    #[error("{0}")]
    Unavailable(String),
}

/// Rejected threshold updates. The previous set stays in effect.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ThresholdError {
    #[error("{component}: critical threshold {critical} is below warning threshold {warning}")]
    Inverted {
        component: &'static str,
        warning: f64,
        critical: f64,
    },

    #[error("{component}: threshold {value} is not a valid value")]
    OutOfRange { component: &'static str, value: f64 },
}

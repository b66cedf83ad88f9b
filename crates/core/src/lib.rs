//! modelctl_core - Core library for model lifecycle orchestration
//!
//! This crate provides:
//! - Model catalog and lifecycle-state registry
//! - Download orchestration against an external artifact service
//! - Metrics history and threshold alerts
//! - Configuration

pub mod config;
pub mod downloaders;
pub mod downloads;
pub mod error;
pub mod models;
pub mod monitor;
pub mod registry;

pub use config::Config;
pub use downloads::{DownloadOrchestrator, DownloadProgress, DownloadSettings};
pub use error::{DownloadError, RegistryError, SourceError, ThresholdError};
pub use models::{ModelCategory, ModelRecord, ModelSize, ModelStatus, PerformanceTier};
pub use monitor::PerformanceMonitor;
pub use registry::{ModelFilter, ModelRegistry};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::downloads::DownloadSettings;
use crate::monitor::ThresholdSet;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Daemon settings
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Download orchestration settings
    #[serde(default)]
    pub downloads: DownloadsConfig,

    /// Telemetry and history settings
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Model runtime service
    #[serde(default)]
    pub runtime: RuntimeServiceConfig,

    /// Alert thresholds in effect at startup
    #[serde(default)]
    pub thresholds: ThresholdSet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadsConfig {
    /// Base URL of the artifact-fetch service
    #[serde(default = "default_artifact_url")]
    pub service_url: String,

    /// Progress poll cadence in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum duration of one download in seconds
    #[serde(default = "default_download_timeout_secs")]
    pub timeout_secs: u64,

    /// Optional cap on downloads in flight
    #[serde(default)]
    pub max_concurrent: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Telemetry provider endpoint. Without it samples must be pushed.
    #[serde(default)]
    pub telemetry_url: Option<String>,

    /// Pull cadence in seconds
    #[serde(default = "default_sample_interval_secs")]
    pub sample_interval_secs: u64,

    /// Longest history window kept in memory, in minutes
    #[serde(default = "default_retention_minutes")]
    pub retention_minutes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeServiceConfig {
    /// Base URL of the model runtime service
    #[serde(default = "default_runtime_url")]
    pub service_url: String,

    /// Unload models loaded longer than this many minutes. 0 disables.
    #[serde(default = "default_idle_unload_minutes")]
    pub idle_unload_minutes: u64,
}

fn default_port() -> u16 {
    8000
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_artifact_url() -> String {
    "http://127.0.0.1:8100".to_string()
}

fn default_runtime_url() -> String {
    "http://127.0.0.1:8200".to_string()
}

fn default_idle_unload_minutes() -> u64 {
    60
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_download_timeout_secs() -> u64 {
    600
}

fn default_sample_interval_secs() -> u64 {
    30
}

fn default_retention_minutes() -> u64 {
    60
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            service_url: default_artifact_url(),
            poll_interval_ms: default_poll_interval_ms(),
            timeout_secs: default_download_timeout_secs(),
            max_concurrent: None,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            telemetry_url: None,
            sample_interval_secs: default_sample_interval_secs(),
            retention_minutes: default_retention_minutes(),
        }
    }
}

impl Default for RuntimeServiceConfig {
    fn default() -> Self {
        Self {
            service_url: default_runtime_url(),
            idle_unload_minutes: default_idle_unload_minutes(),
        }
    }
}

impl DownloadsConfig {
    pub fn settings(&self) -> DownloadSettings {
        DownloadSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            timeout: Duration::from_secs(self.timeout_secs),
            max_concurrent: self.max_concurrent,
        }
    }
}

impl MonitorConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_secs.max(1))
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_minutes * 60)
    }
}

impl RuntimeServiceConfig {
    pub fn idle_unload_after(&self) -> Option<Duration> {
        match self.idle_unload_minutes {
            0 => None,
            minutes => Some(Duration::from_secs(minutes * 60)),
        }
    }
}

impl Config {
    /// Get the base directory: ~/.config/modelctl/
    pub fn base_dir() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .map(PathBuf::from)
            .or_else(|_| std::env::var("USERPROFILE").map(PathBuf::from))
            .map_err(|_| anyhow::anyhow!("Could not determine home directory"))?;
        Ok(home.join(".config").join("modelctl"))
    }

    /// Load config from default location
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            config
                .thresholds
                .validate()
                .map_err(|e| anyhow::anyhow!("Invalid [thresholds] in {:?}: {}", config_path, e))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save config to default location
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&config_path, content)?;
        Ok(())
    }

    /// Get the config file path: ~/.config/modelctl/config.toml
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("config.toml"))
    }

    /// Get the registry status cache path: ~/.config/modelctl/registry.json
    pub fn registry_cache_path() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("registry.json"))
    }
}

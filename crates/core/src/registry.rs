use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tokio::sync::RwLock;

use crate::error::RegistryError;
use crate::models::{self, ModelCategory, ModelRecord, ModelStatus, PerformanceTier};

/// Optional filters for [`ModelRegistry::list`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelFilter {
    #[serde(default)]
    pub category: Option<ModelCategory>,
    #[serde(default)]
    pub tier: Option<PerformanceTier>,
    #[serde(default)]
    pub status: Option<ModelStatus>,
}

impl ModelFilter {
    fn matches(&self, model: &ModelRecord) -> bool {
        self.category.map_or(true, |c| model.category == c)
            && self.tier.map_or(true, |t| model.performance_tier == t)
            && self.status.map_or(true, |s| model.status == s)
    }
}

/// Model counts per lifecycle status.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RegistrySummary {
    pub total: usize,
    pub by_status: BTreeMap<&'static str, usize>,
}

impl RegistrySummary {
    pub fn count(&self, status: ModelStatus) -> usize {
        self.by_status.get(status.as_str()).copied().unwrap_or(0)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    status: ModelStatus,
}

/// Authoritative store of model lifecycle state.
///
/// Reads hand out snapshots. [`ModelRegistry::transition`] is the only way to
/// change a record and performs a compare-and-swap on the status under a
/// single write lock, so two writers racing on the same model can never both
/// succeed from the same starting state.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: RwLock<HashMap<String, ModelRecord>>,
}

impl ModelRegistry {
    pub fn new(models: impl IntoIterator<Item = ModelRecord>) -> Self {
        let models = models.into_iter().map(|m| (m.id.clone(), m)).collect();
        Self {
            models: RwLock::new(models),
        }
    }

    /// Registry seeded with the built-in catalog, every model `available`.
    pub fn with_catalog() -> Self {
        Self::new(models::catalog())
    }

    pub async fn get(&self, id: &str) -> Result<ModelRecord, RegistryError> {
        self.models
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// Snapshot of all matching records, sorted by tier, size class and id.
    pub async fn list(&self, filter: &ModelFilter) -> Vec<ModelRecord> {
        let models = self.models.read().await;
        let mut matching: Vec<ModelRecord> = models
            .values()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            (a.performance_tier, a.size, &a.id).cmp(&(b.performance_tier, b.size, &b.id))
        });
        matching
    }

    /// Move `id` to `to` if its current status is one of `from`.
    ///
    /// A status change resets `download_progress` to `progress` (or 0). When
    /// the status does not change only the progress is updated. Returns the
    /// record as it is after the transition.
    pub async fn transition(
        &self,
        id: &str,
        from: &[ModelStatus],
        to: ModelStatus,
        progress: Option<f32>,
    ) -> Result<ModelRecord, RegistryError> {
        let mut models = self.models.write().await;
        let model = models
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        if !from.contains(&model.status) {
            return Err(RegistryError::Conflict {
                id: id.to_string(),
                current: model.status,
                to,
            });
        }

        let progress = progress.map(|p| p.clamp(0.0, 100.0));
        if model.status == to {
            if let Some(p) = progress {
                model.download_progress = p;
            }
        } else {
            tracing::info!(model = id, "{} -> {}", model.status, to);
            model.status = to;
            model.download_progress = progress.unwrap_or(0.0);
        }

        Ok(model.clone())
    }

    pub async fn summary(&self) -> RegistrySummary {
        let models = self.models.read().await;
        let mut by_status: BTreeMap<&'static str, usize> =
            ModelStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
        for model in models.values() {
            *by_status.entry(model.status.as_str()).or_default() += 1;
        }
        RegistrySummary {
            total: models.len(),
            by_status,
        }
    }

    /// Persist every model's settled status as JSON.
    pub async fn save_cache(&self, path: &Path) -> Result<()> {
        let cache: BTreeMap<String, CacheEntry> = self
            .models
            .read()
            .await
            .values()
            .map(|m| {
                (
                    m.id.clone(),
                    CacheEntry {
                        status: m.status.settled(),
                    },
                )
            })
            .collect();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&cache)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write registry cache {:?}", path))?;
        Ok(())
    }

    /// Apply a cache written by [`ModelRegistry::save_cache`]. Unknown ids
    /// are ignored; a missing file is not an error. Returns how many records
    /// were updated.
    pub async fn restore_cache(&self, path: &Path) -> Result<usize> {
        if !path.exists() {
            return Ok(0);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read registry cache {:?}", path))?;
        let cache: HashMap<String, CacheEntry> =
            serde_json::from_str(&content).context("Malformed registry cache")?;

        let mut models = self.models.write().await;
        let mut restored = 0;
        for (id, entry) in cache {
            if let Some(model) = models.get_mut(&id) {
                model.status = entry.status.settled();
                model.download_progress = 0.0;
                restored += 1;
            }
        }
        Ok(restored)
    }
}

use anyhow::Result;
use modelctl_core::{Config, ModelRecord};
use serde::Deserialize;

use crate::client::DaemonClient;

#[derive(Deserialize)]
struct ModelsResponse {
    models: Vec<ModelRecord>,
}

pub async fn execute(category: Option<&str>, status: Option<&str>) -> Result<()> {
    let client = DaemonClient::from_config(&Config::load()?)?;

    let response: ModelsResponse = client.get(&models_path(category, status)).await?;
    if response.models.is_empty() {
        println!("No models match.");
        return Ok(());
    }

    println!(
        "{:<26} {:<14} {:<8} {:<12} {:>9}  {}",
        "ID", "CATEGORY", "SIZE", "TIER", "DOWNLOAD", "STATUS"
    );
    println!("{}", "-".repeat(84));

    for model in response.models {
        let status = if model.status == modelctl_core::ModelStatus::Downloading {
            format!("{} ({:.0}%)", model.status, model.download_progress)
        } else {
            model.status.to_string()
        };
        println!(
            "{:<26} {:<14} {:<8} {:<12} {:>6} MB  {}",
            model.id,
            model.category.as_str(),
            model.size.as_str(),
            model.performance_tier.as_str(),
            model.download_size_mb,
            status
        );
    }

    Ok(())
}

fn models_path(category: Option<&str>, status: Option<&str>) -> String {
    let params: Vec<String> = [("category", category), ("status", status)]
        .iter()
        .filter_map(|(k, v)| v.map(|v| format!("{}={}", k, v)))
        .collect();

    if params.is_empty() {
        "/models".to_string()
    } else {
        format!("/models?{}", params.join("&"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_filter_query() {
        assert_eq!(models_path(None, None), "/models");
        assert_eq!(models_path(Some("programming"), None), "/models?category=programming");
        assert_eq!(
            models_path(Some("general"), Some("loaded")),
            "/models?category=general&status=loaded"
        );
    }
}

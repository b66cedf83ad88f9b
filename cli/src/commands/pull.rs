use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use modelctl_core::{Config, ModelRecord, ModelStatus};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::client::{is_status, DaemonClient};

#[derive(Deserialize)]
struct Progress {
    progress: f32,
    speed: f64,
    eta: f64,
}

pub async fn execute(model: &str) -> Result<()> {
    let client = DaemonClient::from_config(&Config::load()?)?;

    println!("Pulling model: {}", model);
    match client
        .post::<_, serde_json::Value>("/models/download", &json!({ "model_id": model }))
        .await
    {
        Ok(_) => {}
        Err(e) if is_status(&e, StatusCode::CONFLICT) => {
            println!("{}", e);
        }
        Err(e) => return Err(e),
    }

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")?
            .progress_chars("#>-"),
    );

    let progress_path = format!("/models/{}/download-progress", model);
    let model_path = format!("/models/{}", model);

    loop {
        match client.get::<Progress>(&progress_path).await {
            Ok(p) => {
                pb.set_position(p.progress.clamp(0.0, 100.0) as u64);
                pb.set_message(format_rate(p.speed, p.eta));
            }
            // No task: either finished or never started
            Err(e) if is_status(&e, StatusCode::NOT_FOUND) => {
                let record: ModelRecord = client.get(&model_path).await?;
                match record.status {
                    status if status.is_downloaded() => {
                        pb.set_position(100);
                        pb.finish_with_message("done");
                        println!("\nModel {} downloaded. Run `modelctl load {}` to load it.", model, model);
                        return Ok(());
                    }
                    ModelStatus::Error => {
                        pb.abandon_with_message("failed");
                        anyhow::bail!("Download of {} failed", model);
                    }
                    _ => {}
                }
            }
            Err(e) => return Err(e),
        }

        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}

fn format_rate(speed: f64, eta: f64) -> String {
    if speed <= 0.0 {
        return String::new();
    }
    if eta > 0.0 {
        format!("{:.1} MB/s, {:.0}s left", speed, eta)
    } else {
        format!("{:.1} MB/s", speed)
    }
}

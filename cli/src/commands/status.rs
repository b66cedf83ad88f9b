use anyhow::Result;
use modelctl_core::monitor::{Alert, MetricsSample};
use modelctl_core::Config;
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::client::DaemonClient;

#[derive(Deserialize)]
struct ModelsSummary {
    total: usize,
    by_status: BTreeMap<String, usize>,
    downloading: Vec<String>,
    loaded: Vec<String>,
}

#[derive(Deserialize)]
struct AlertCounts {
    total: usize,
    critical: usize,
    warning: usize,
    recent: Vec<Alert>,
}

#[derive(Deserialize)]
struct MonitorSummary {
    current: Option<MetricsSample>,
    alerts: AlertCounts,
}

pub async fn execute() -> Result<()> {
    let client = DaemonClient::from_config(&Config::load()?)?;

    println!("modelctl status\n");

    let running = client.is_healthy().await;
    println!(
        "Daemon: {} ({})",
        if running { "running" } else { "not running" },
        client.base_url()
    );
    if !running {
        println!("\nRun `modelctl serve` to start the daemon.");
        return Ok(());
    }

    let models: ModelsSummary = client.get("/models/summary").await?;
    println!("\nModels: {}", models.total);
    for (status, count) in &models.by_status {
        if *count > 0 {
            println!("  {:<12} {}", status, count);
        }
    }
    if !models.downloading.is_empty() {
        println!("Downloading: {}", models.downloading.join(", "));
    }
    if !models.loaded.is_empty() {
        println!("Loaded: {}", models.loaded.join(", "));
    }

    let monitor: MonitorSummary = client.get("/performance/summary").await?;
    match &monitor.current {
        Some(sample) => {
            println!("\nResources:");
            println!("  CPU     {:>5.1}%", sample.cpu_percent);
            println!(
                "  Memory  {:>5.1}% ({} / {} MB)",
                sample.memory_percent, sample.memory_used, sample.memory_total
            );
            println!(
                "  Disk    {:>5.1}% ({} / {} GB)",
                sample.disk_percent, sample.disk_used, sample.disk_total
            );
            if let Some(gpu) = sample.gpu_utilization {
                println!("  GPU     {:>5.1}%", gpu);
            }
            if let Some(temp) = sample.temperature {
                println!("  Temp    {:>5.1}°C", temp);
            }
        }
        None => println!("\nResources: no samples yet"),
    }

    println!(
        "\nAlerts: {} ({} critical, {} warning)",
        monitor.alerts.total, monitor.alerts.critical, monitor.alerts.warning
    );
    for alert in &monitor.alerts.recent {
        println!("  [{}] {}", alert.id, alert.message);
    }

    Ok(())
}

use anyhow::Result;
use modelctl_core::monitor::Alert;
use modelctl_core::Config;
use serde::Deserialize;
use serde_json::json;

use crate::client::DaemonClient;

#[derive(Deserialize)]
struct AlertsResponse {
    alerts: Vec<Alert>,
}

#[derive(Deserialize)]
struct DismissResponse {
    remaining: usize,
}

pub async fn execute(level: Option<&str>, dismiss: Option<u64>) -> Result<()> {
    let client = DaemonClient::from_config(&Config::load()?)?;

    if let Some(id) = dismiss {
        let response: DismissResponse = client
            .post("/performance/alerts/dismiss", &json!({ "alert_id": id }))
            .await?;
        println!("Dismissed alert {} ({} still active)", id, response.remaining);
        return Ok(());
    }

    let path = match level {
        Some(level) => format!("/performance/alerts?level={}", level),
        None => "/performance/alerts".to_string(),
    };
    let response: AlertsResponse = client.get(&path).await?;

    if response.alerts.is_empty() {
        println!("No active alerts.");
        return Ok(());
    }

    println!("{:<6} {:<9} {:<20} {}", "ID", "LEVEL", "SINCE", "MESSAGE");
    println!("{}", "-".repeat(72));
    for alert in response.alerts {
        println!(
            "{:<6} {:<9} {:<20} {}",
            alert.id,
            alert.level.as_str(),
            format_timestamp(alert.timestamp),
            alert.message
        );
    }

    Ok(())
}

fn format_timestamp(timestamp: f64) -> String {
    chrono::DateTime::from_timestamp(timestamp as i64, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_unix_seconds() {
        assert_eq!(format_timestamp(0.0), "1970-01-01 00:00:00");
        assert_eq!(format_timestamp(1_700_000_000.5), "2023-11-14 22:13:20");
    }
}

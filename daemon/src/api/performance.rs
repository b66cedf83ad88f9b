use axum::{
    extract::{Query, State},
    Json,
};
use modelctl_core::monitor::{Alert, AlertLevel, MetricsSample, MonitorSummary, ThresholdSet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_duration_minutes")]
    pub duration_minutes: u64,
}

fn default_duration_minutes() -> u64 {
    60
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub duration_minutes: u64,
    pub samples: Vec<MetricsSample>,
}

#[derive(Deserialize)]
pub struct AlertsQuery {
    #[serde(default)]
    pub level: Option<AlertLevel>,
}

#[derive(Serialize)]
pub struct AlertsResponse {
    pub alerts: Vec<Alert>,
    pub total: usize,
}

/// Identifies an alert by id or, as the dashboard does, by list position.
#[derive(Deserialize)]
pub struct DismissRequest {
    #[serde(default)]
    pub alert_id: Option<u64>,
    #[serde(default)]
    pub alert_index: Option<usize>,
}

#[derive(Serialize)]
pub struct DismissResponse {
    pub dismissed: bool,
    pub remaining: usize,
}

pub async fn current_metrics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MetricsSample>, ApiError> {
    state
        .monitor
        .latest()
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found("No metrics sampled yet"))
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Json<HistoryResponse> {
    let window = Duration::from_secs(query.duration_minutes.saturating_mul(60));
    Json(HistoryResponse {
        duration_minutes: query.duration_minutes,
        samples: state.monitor.history(window).await,
    })
}

pub async fn alerts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AlertsQuery>,
) -> Json<AlertsResponse> {
    let alerts = state.monitor.active_alerts(query.level).await;
    Json(AlertsResponse {
        total: alerts.len(),
        alerts,
    })
}

pub async fn dismiss_alert(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DismissRequest>,
) -> Result<Json<DismissResponse>, ApiError> {
    let dismissed = match (request.alert_id, request.alert_index) {
        (Some(id), _) => state.monitor.dismiss(id).await,
        (None, Some(index)) => state.monitor.dismiss_index(index).await,
        (None, None) => {
            return Err(ApiError::bad_request(
                "Either alert_id or alert_index is required",
            ))
        }
    };

    if !dismissed {
        return Err(ApiError::not_found("No such alert"));
    }

    Ok(Json(DismissResponse {
        dismissed,
        remaining: state.monitor.active_alerts(None).await.len(),
    }))
}

pub async fn get_thresholds(State(state): State<Arc<AppState>>) -> Json<ThresholdSet> {
    Json(state.monitor.thresholds().await)
}

pub async fn update_thresholds(
    State(state): State<Arc<AppState>>,
    Json(thresholds): Json<ThresholdSet>,
) -> Result<Json<ThresholdSet>, ApiError> {
    state.monitor.update_thresholds(thresholds).await?;
    Ok(Json(thresholds))
}

pub async fn summary(State(state): State<Arc<AppState>>) -> Json<MonitorSummary> {
    Json(state.monitor.summary().await)
}

pub async fn push_sample(
    State(state): State<Arc<AppState>>,
    Json(sample): Json<MetricsSample>,
) -> Json<AlertsResponse> {
    let alerts = state.monitor.ingest(sample).await;
    Json(AlertsResponse {
        total: alerts.len(),
        alerts,
    })
}

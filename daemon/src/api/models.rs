use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use modelctl_core::registry::RegistrySummary;
use modelctl_core::{DownloadProgress, ModelFilter, ModelRecord};
use modelctl_runtime_api::RuntimeStatus;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ModelRequest {
    pub model_id: String,
}

#[derive(Serialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelRecord>,
    pub total: usize,
}

#[derive(Serialize)]
pub struct SummaryResponse {
    #[serde(flatten)]
    pub summary: RegistrySummary,
    pub downloading: Vec<String>,
    pub loaded: Vec<String>,
}

#[derive(Serialize)]
pub struct ActionResponse {
    pub model_id: String,
    pub status: String,
    pub message: String,
}

pub async fn list_models(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ModelFilter>,
) -> Json<ModelsResponse> {
    let models = state.registry.list(&filter).await;
    Json(ModelsResponse {
        total: models.len(),
        models,
    })
}

pub async fn get_model(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ModelRecord>, ApiError> {
    Ok(Json(state.registry.get(&id).await?))
}

pub async fn summary(State(state): State<Arc<AppState>>) -> Json<SummaryResponse> {
    Json(SummaryResponse {
        summary: state.registry.summary().await,
        downloading: state.downloads.active().await,
        loaded: state.loader.loaded().await,
    })
}

pub async fn loaded_models(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.loader.loaded().await)
}

pub async fn start_download(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ModelRequest>,
) -> Result<(StatusCode, Json<ActionResponse>), ApiError> {
    state.downloads.start_download(&request.model_id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(ActionResponse {
            message: format!("Download of {} started", request.model_id),
            status: "downloading".to_string(),
            model_id: request.model_id,
        }),
    ))
}

pub async fn download_progress(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DownloadProgress>, ApiError> {
    if let Some(progress) = state.downloads.progress(&id).await {
        return Ok(Json(progress));
    }
    let model = state.registry.get(&id).await?;
    Err(ApiError::not_found(format!(
        "No download in progress for '{}' (status: {})",
        id, model.status
    )))
}

pub async fn load_model(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ModelRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    state.loader.load(&request.model_id).await?;
    Ok(Json(ActionResponse {
        message: format!("Model {} loaded", request.model_id),
        status: "loaded".to_string(),
        model_id: request.model_id,
    }))
}

pub async fn unload_model(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ModelRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    state.loader.unload(&request.model_id).await?;
    Ok(Json(ActionResponse {
        message: format!("Model {} unloaded", request.model_id),
        status: "downloaded".to_string(),
        model_id: request.model_id,
    }))
}

pub async fn runtime_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RuntimeStatus>, ApiError> {
    Ok(Json(state.loader.runtime_status().await?))
}

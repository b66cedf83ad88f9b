pub mod error;
pub mod models;
pub mod performance;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;
use std::sync::Arc;

pub use error::ApiError;

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/models", get(models::list_models))
        .route("/models/summary", get(models::summary))
        .route("/models/loaded", get(models::loaded_models))
        .route("/models/download", post(models::start_download))
        .route("/models/load", post(models::load_model))
        .route("/models/unload", post(models::unload_model))
        .route("/models/:id", get(models::get_model))
        .route("/models/:id/download-progress", get(models::download_progress))
        .route("/runtime/status", get(models::runtime_status))
        .route("/performance/metrics", get(performance::current_metrics))
        .route("/performance/history", get(performance::history))
        .route("/performance/alerts", get(performance::alerts))
        .route("/performance/alerts/dismiss", post(performance::dismiss_alert))
        .route(
            "/performance/thresholds",
            get(performance::get_thresholds).put(performance::update_thresholds),
        )
        .route("/performance/summary", get(performance::summary))
        .route("/performance/samples", post(performance::push_sample))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};

use serde::Serialize;
use tracing::debug;

use crate::state::app_state::AppState;

pub fn health_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(info_check))
        .with_state(state)
}

pub async fn info_check(State(state): State<AppState>) -> impl IntoResponse {
    debug!("{} requested", state.config.name);
    Json(state.config.as_ref().clone())
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let loaded_series = state.series.read().await.len();
    let signals = state.signals.read().await.len();

    Json(HealthStatus {
        status: "ok".to_owned(),
        loaded_series,
        signals,
    })
}

#[derive(Serialize)]
pub struct HealthStatus {
    status: String,
    loaded_series: usize,
    signals: usize,
}

use axum::{
    extract::{ws::WebSocketUpgrade, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use uuid::Uuid;

use ktk_core::core::store::FILE_EXTENSION;
use ktk_core::core::tabular::column_names;
use ktk_core::{load_series, ErrorKind, TimeSeries, TimeSeriesFile, TsError};

use crate::routes::ws_handler::handle_ws_fetch;
use crate::state::app_state::{AppState, LoadedSeries, SignalInfo};

#[derive(Serialize)]
pub struct SeriesSummary {
    pub id: String,
    pub path: String,
    pub n_samples: usize,
    pub headers: Vec<String>,
    pub events: usize,
}

#[derive(Deserialize, Debug)]
pub struct FileReadRequest {
    pub path: String,
}

#[derive(Serialize, Debug)]
pub struct FileReadResponse {
    pub id: String,
    pub name: String,
    pub path: String,
    pub headers: Vec<String>,
    pub created_at: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ViewQuery {
    /// Comma-separated channel keys; all channels when absent.
    pub keys: Option<String>,
}

pub fn data_routes(state: AppState) -> Router {
    Router::new()
        .route("/read-file", post(read_file))
        .route("/fetch/{header}", get(ws_fetch))
        .route("/series", get(list_series))
        .route("/series/{id}", delete(unload_series))
        .route("/series/{id}/view", get(series_view))
        .with_state(state)
}

fn status_for(err: &TsError) -> StatusCode {
    match err.kind() {
        ErrorKind::KeyNotFound => StatusCode::NOT_FOUND,
        ErrorKind::Io | ErrorKind::Format => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::BAD_REQUEST,
    }
}

/// `base`, or `base_1`, `base_2`... whichever is free first.
pub fn unique_header(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    let mut i = 1;
    loop {
        let candidate = format!("{}_{}", base, i);
        if !taken(&candidate) {
            return candidate;
        }
        i += 1;
    }
}

fn open_series(path: &str) -> ktk_core::Result<(TimeSeries, Option<String>)> {
    let is_container = std::path::Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        == Some(FILE_EXTENSION);
    if is_container {
        let file = TimeSeriesFile::open(path)?;
        let created_at = file.created_at().map(|t| t.to_rfc3339());
        Ok((file.read_series()?, created_at))
    } else {
        Ok((load_series(path)?, None))
    }
}

async fn read_file(
    State(state): State<AppState>,
    Json(request): Json<FileReadRequest>,
) -> Response {
    debug!("Reading file: path={}", request.path);

    let path = request.path.clone();
    let loaded = match tokio::task::spawn_blocking(move || open_series(&path)).await {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("Loader task failed for {}: {}", request.path, e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let (series, created_at) = match loaded {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to open file {}: {}", request.path, e);
            return status_for(&e).into_response();
        }
    };
    let series = Arc::new(series);

    let mut exposed_headers = Vec::new();
    let mut signals = state.signals.write().await;

    for (channel, value) in series.data.iter() {
        for (column, base_name) in column_names(channel, &value.shape()[1..]).into_iter().enumerate() {
            let final_name = unique_header(&base_name, |name| signals.contains_key(name));

            info!("Register signal: {} (original: {})", final_name, base_name);

            signals.insert(
                final_name.clone(),
                SignalInfo {
                    series: series.clone(),
                    channel: channel.clone(),
                    column,
                    original_name: base_name,
                },
            );
            exposed_headers.push(final_name);
        }
    }
    drop(signals);

    let file_name = request
        .path
        .rsplit('/')
        .next()
        .unwrap_or("unknown")
        .to_string();
    let id = Uuid::new_v4().to_string();

    state.series.write().await.insert(
        id.clone(),
        LoadedSeries {
            id: id.clone(),
            path: request.path.clone(),
            series,
            headers: exposed_headers.clone(),
            created_at: created_at.clone(),
        },
    );

    Json(FileReadResponse {
        id,
        name: file_name,
        path: request.path,
        headers: exposed_headers,
        created_at,
    })
    .into_response()
}

async fn ws_fetch(
    State(state): State<AppState>,
    Path(header): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let signal_info = {
        let signals = state.signals.read().await;
        signals.get(&header).cloned()
    };

    let signal_info = match signal_info {
        Some(info) => info,
        None => {
            error!("Signal not found: {}", header);
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_ws_fetch(socket, signal_info))
}

async fn list_series(State(state): State<AppState>) -> impl IntoResponse {
    let loaded = state.series.read().await;

    let mut out: Vec<SeriesSummary> = loaded
        .values()
        .map(|l| SeriesSummary {
            id: l.id.clone(),
            path: l.path.clone(),
            n_samples: l.series.len(),
            headers: l.headers.clone(),
            events: l.series.events.len(),
        })
        .collect();
    out.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.id.cmp(&b.id)));

    Json(out)
}

async fn unload_series(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    match state.unload(&id).await {
        Some(loaded) => {
            info!("Unloaded {} ({} signals)", loaded.path, loaded.headers.len());
            StatusCode::NO_CONTENT
        }
        None => StatusCode::NOT_FOUND,
    }
}

async fn series_view(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ViewQuery>,
) -> Response {
    let series = match state.series.read().await.get(&id) {
        Some(l) => l.series.clone(),
        None => return StatusCode::NOT_FOUND.into_response(),
    };

    let keys: Vec<&str> = query
        .keys
        .as_deref()
        .map(|k| k.split(',').map(str::trim).filter(|k| !k.is_empty()).collect())
        .unwrap_or_default();

    match series.plot_view(&keys) {
        Ok(view) => Json(view).into_response(),
        Err(e) => {
            debug!("View of {} failed: {}", id, e);
            status_for(&e).into_response()
        }
    }
}

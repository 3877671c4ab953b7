use axum::Router;
use tracing::{info, Level};

mod models;
mod routes;
mod state;
mod utils;

use crate::models::server_model::DEFAULT_CONFIG_PATH;
use crate::state::app_state::AppState;
use crate::utils::conf_helper::{bind, load_config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    // === CONFIG + LISTENER ===
    let mut config = load_config(&config_path).await?;
    let listener = bind(&mut config).await?;

    info!(
        "{} {} serving on {}:{}",
        config.name, config.version, config.connection.ip, config.connection.port
    );

    let state = AppState::new(config);

    let app = Router::new()
        .merge(routes::info_routes::health_routes(state.clone()))
        .merge(routes::data_routes::data_routes(state));

    axum::serve(listener, app).await?;
    Ok(())
}

use anyhow::Context;
use tokio::fs;
use tokio::net::TcpListener;
use tracing::info;

use crate::models::server_model::ServerConfig;

pub async fn load_config(file_path: &str) -> anyhow::Result<ServerConfig> {
    let data = fs::read_to_string(file_path)
        .await
        .with_context(|| format!("File read error: {file_path}"))?;

    let config: ServerConfig =
        serde_json::from_str(&data).with_context(|| format!("JSON parse error in {file_path}"))?;

    Ok(config)
}

/// Bind the configured address and write the actual port back into
/// `config`.
pub async fn bind(config: &mut ServerConfig) -> anyhow::Result<TcpListener> {
    let bind_addr = format!("{}:{}", config.connection.ip, config.connection.port);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Bind failed: {bind_addr}"))?;

    let actual_port = listener.local_addr().context("Addr error")?.port();
    config.connection.port = actual_port;

    info!("Config initialized with dynamic port: {}", actual_port);

    Ok(listener)
}

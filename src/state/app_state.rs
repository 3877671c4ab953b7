use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use ktk_core::TimeSeries;

use crate::models::server_model::ServerConfig;

/// One flattened column of a loaded series, exposed under a unique header.
#[derive(Clone)]
pub struct SignalInfo {
    pub series: Arc<TimeSeries>,
    pub channel: String,
    // Column within the channel's flattened trailing dimensions
    pub column: usize,
    pub original_name: String,
}

#[derive(Clone)]
pub struct LoadedSeries {
    pub id: String,
    pub path: String,
    pub series: Arc<TimeSeries>,
    pub headers: Vec<String>,
    pub created_at: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    // series id -> loaded file
    pub series: Arc<RwLock<HashMap<String, LoadedSeries>>>,
    // unique header -> column
    pub signals: Arc<RwLock<HashMap<String, SignalInfo>>>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
            series: Arc::new(RwLock::new(HashMap::new())),
            signals: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Drop a loaded series and every header registered for it.
    pub async fn unload(&self, id: &str) -> Option<LoadedSeries> {
        let loaded = self.series.write().await.remove(id)?;
        let mut signals = self.signals.write().await;
        for header in &loaded.headers {
            signals.remove(header);
        }
        Some(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::server_model::Connection;

    fn config() -> ServerConfig {
        ServerConfig {
            name: "ktk".to_string(),
            version: "0.1.0".to_string(),
            description: String::new(),
            file_formats: vec!["json".to_string()],
            connection: Connection {
                ip: "127.0.0.1".to_string(),
                port: 0,
            },
        }
    }

    async fn register(state: &AppState, id: &str, headers: &[&str]) {
        let series = Arc::new(TimeSeries::with_time(vec![0.0, 1.0]));
        let mut signals = state.signals.write().await;
        for header in headers {
            signals.insert(
                header.to_string(),
                SignalInfo {
                    series: series.clone(),
                    channel: "x".to_string(),
                    column: 0,
                    original_name: "x".to_string(),
                },
            );
        }
        state.series.write().await.insert(
            id.to_string(),
            LoadedSeries {
                id: id.to_string(),
                path: format!("{}.json", id),
                series,
                headers: headers.iter().map(|h| h.to_string()).collect(),
                created_at: None,
            },
        );
    }

    #[tokio::test]
    async fn test_unload_removes_series_and_headers() {
        let state = AppState::new(config());
        register(&state, "a", &["x", "y"]).await;
        register(&state, "b", &["x_1"]).await;

        let removed = state.unload("a").await.unwrap();
        assert_eq!(removed.headers, vec!["x", "y"]);
        assert!(!state.series.read().await.contains_key("a"));
        let signals = state.signals.read().await;
        assert_eq!(signals.len(), 1);
        assert!(signals.contains_key("x_1"));
        drop(signals);

        assert!(state.unload("a").await.is_none());
    }
}

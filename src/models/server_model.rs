use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "ktk-server.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_file_formats")]
    pub file_formats: Vec<String>,
    pub connection: Connection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub ip: String,
    /// 0 lets the OS pick a free port.
    #[serde(default)]
    pub port: u16,
}

fn default_file_formats() -> Vec<String> {
    vec!["ktks".to_string(), "json".to_string()]
}

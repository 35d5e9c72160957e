use anyhow::{Context, Result};
use futdesk_brokers_binance::BinanceConfig;
use futdesk_engine::DeskConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Settings read from the optional `--config` TOML file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub exchange: BinanceConfig,
    pub desk: DeskConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub log_file: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8501".to_string(),
            log_file: PathBuf::from("futdesk.log"),
        }
    }
}

impl AppConfig {
    /// Exchange settings with the desk's recvWindow, so account reads and
    /// orders share one window.
    pub fn binance_config(&self) -> BinanceConfig {
        BinanceConfig {
            recv_window_ms: self.desk.recv_window_ms,
            ..self.exchange.clone()
        }
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }
}

//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `bridge.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - SerialConfig: uart device, baud rate, read chunk and idle interval.
//!     - ServerConfig: listen address, buffer sizes, data endpoint marker.
//!     - AlertConfig: telegram credentials and the throttle interval.
//!     - LoggingConfig: default log filter.
//!
//! secrets:
//!     bot token and chat id can come from MOTION_BRIDGE_BOT_TOKEN and
//!     MOTION_BRIDGE_CHAT_ID so they stay out of the config file.
//!
//! ==============================================================================

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const BOT_TOKEN_ENV: &str = "MOTION_BRIDGE_BOT_TOKEN";
pub const CHAT_ID_ENV: &str = "MOTION_BRIDGE_CHAT_ID";

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct BridgeConfig {
    pub serial: SerialConfig,
    pub server: ServerConfig,
    pub alert: AlertConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SerialConfig {
    pub device: String,
    pub baud_rate: u32,
    /// largest read per tick
    pub chunk_size: usize,
    /// sleep between checks when nothing is pending
    pub poll_interval_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: "/dev/serial0".to_string(),
            baud_rate: 9600,
            chunk_size: 128,
            poll_interval_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// bytes read from a client before dispatching
    pub request_buffer: usize,
    /// largest single write of the page body
    pub write_chunk: usize,
    pub read_timeout_secs: u64,
    /// substring of the request line that selects the json endpoint
    pub data_marker: String,
    /// html file served instead of the built-in page
    pub page_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 80,
            request_buffer: 1024,
            write_chunk: 512,
            read_timeout_secs: 5,
            data_marker: "GET /data".to_string(),
            page_path: None,
        }
    }
}

impl ServerConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AlertConfig {
    pub enabled: bool,
    pub api_base: String,
    pub bot_token: String,
    pub chat_id: String,
    pub min_interval_secs: u64,
    pub message: String,
    pub request_timeout_secs: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_base: "https://api.telegram.org".to_string(),
            bot_token: String::new(),
            chat_id: String::new(),
            min_interval_secs: 30,
            message: "Motion Detected!".to_string(),
            request_timeout_secs: 10,
        }
    }
}

impl AlertConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_secs(self.min_interval_secs)
    }

    pub fn has_credentials(&self) -> bool {
        !self.bot_token.trim().is_empty() && !self.chat_id.trim().is_empty()
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// log every accepted reading
    pub show_sensor_data: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            show_sensor_data: false,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("failed to read config file {}", path.as_ref().display()))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).context("failed to parse config")
    }

    /// Load with default fallback, then apply environment overrides
    pub fn load_or_default() -> Self {
        let paths = [
            PathBuf::from("config").join("bridge.toml"),
            PathBuf::from("..").join("config").join("bridge.toml"),
        ];

        let mut config = None;
        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(c) => {
                        tracing::info!("config loaded from {}", path.display());
                        config = Some(c);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("failed to load {}: {:#}", path.display(), e);
                    }
                }
            }
        }

        let mut config = config.unwrap_or_else(|| {
            tracing::warn!("no config file found - using defaults");
            Self::default()
        });
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config
    }

    /// override secrets from the environment; `lookup` is `std::env::var` outside tests
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup(BOT_TOKEN_ENV).filter(|v| !v.is_empty()) {
            self.alert.bot_token = token;
        }
        if let Some(chat_id) = lookup(CHAT_ID_ENV).filter(|v| !v.is_empty()) {
            self.alert.chat_id = chat_id;
        }
    }

    /// Log configuration summary, secrets redacted
    pub fn log_summary(&self) {
        tracing::info!(
            device = %self.serial.device,
            baud = self.serial.baud_rate,
            chunk = self.serial.chunk_size,
            poll_ms = self.serial.poll_interval_ms,
            "serial"
        );
        let addr = format!("{}:{}", self.server.bind_address, self.server.port);
        tracing::info!(
            addr = %addr,
            marker = %self.server.data_marker,
            read_timeout_s = self.server.read_timeout_secs,
            "server"
        );
        let credentials = if self.alert.has_credentials() { "set" } else { "missing" };
        tracing::info!(
            enabled = self.alert.enabled,
            credentials,
            min_interval_s = self.alert.min_interval_secs,
            "alert"
        );
    }
}

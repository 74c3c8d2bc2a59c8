//! Configuration management for alert-relay
//!
//! This module defines the main `Config` struct and its sub-structs,
//! responsible for holding all application settings. It uses the `figment`
//! crate to layer built-in defaults, an `alert-relay.toml` file, environment
//! variables and command-line arguments, in that order.

use crate::cli::Cli;
use crate::core::DeliveryBackend;
use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// The file read when no `--config` path is given.
pub const DEFAULT_CONFIG_FILE: &str = "alert-relay.toml";

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// Configuration for the webhook HTTP server.
    pub server: ServerConfig,
    /// Backend selection and default destination.
    pub delivery: DeliveryConfig,
    /// Configuration for the Telegram Bot API client.
    pub telegram: TelegramConfig,
    /// Configuration for the external bridge program.
    pub bridge: BridgeSettings,
    /// Configuration for alert image retrieval.
    pub storage: StorageConfig,
    /// Configuration for the Prometheus endpoint.
    pub metrics: MetricsConfig,
}

/// Configuration for the webhook HTTP server.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServerConfig {
    /// Address the webhook server binds to.
    pub listen_address: SocketAddr,
}

/// Backend selection and default destination.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DeliveryConfig {
    /// Which backend delivers messages.
    pub backend: DeliveryBackend,
    /// Chat used when an alert carries no `chatID` label.
    pub default_chat_id: Option<i64>,
}

/// Configuration for the Telegram Bot API client.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TelegramConfig {
    /// Bot token, required by the direct backend.
    pub bot_token: Option<String>,
    /// Bot API server URL.
    pub api_url: String,
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
}

/// Configuration for the external bridge program.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BridgeSettings {
    /// Program to run for each message.
    pub executable: String,
    /// Arguments placed before `<chat id> <text> [<attachment>]`.
    pub fixed_args: Vec<String>,
    /// Wall-clock limit for one invocation, in milliseconds.
    pub timeout_ms: u64,
}

/// Configuration for alert image retrieval.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StorageConfig {
    /// Replaces the host of image URLs when set.
    pub host: Option<String>,
    /// Replaces the port of image URLs when set.
    pub port: Option<u16>,
    /// Access key for signed downloads. Requests are unsigned when unset.
    pub access_key: Option<String>,
    /// Secret key paired with `access_key`.
    pub secret_key: Option<String>,
    /// Region used in request signatures.
    pub region: String,
    /// Directory downloaded images are written to.
    pub download_dir: PathBuf,
}

/// Configuration for the Prometheus endpoint.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct MetricsConfig {
    /// Serve `/metrics` from the webhook server.
    pub enabled: bool,
}

impl Config {
    /// Loads the application configuration.
    ///
    /// Sources are merged in increasing priority: defaults, the TOML file
    /// named by `--config` (or `alert-relay.toml`), environment variables
    /// such as `ALERT_RELAY_DELIVERY__BACKEND=Bridged`, and finally CLI flags.
    pub fn load(cli: &Cli) -> Result<Self> {
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("ALERT_RELAY_").split("__"))
            .merge(cli.clone())
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations that cannot deliver anything.
    pub fn validate(&self) -> Result<()> {
        match self.delivery.backend {
            DeliveryBackend::Direct => {
                if self.telegram.bot_token.as_deref().map_or(true, str::is_empty) {
                    bail!("the direct backend requires telegram.bot_token");
                }
            }
            DeliveryBackend::Bridged => {
                if self.bridge.executable.trim().is_empty() {
                    bail!("the bridged backend requires bridge.executable");
                }
                if self.bridge.timeout_ms == 0 {
                    bail!("bridge.timeout_ms must be greater than zero");
                }
            }
        }
        Ok(())
    }
}

// Provide a default implementation for tests and easy setup.
impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            server: ServerConfig {
                listen_address: SocketAddr::from(([0, 0, 0, 0], 4000)),
            },
            delivery: DeliveryConfig {
                backend: DeliveryBackend::Direct,
                default_chat_id: None,
            },
            telegram: TelegramConfig {
                bot_token: None,
                api_url: "https://api.telegram.org".to_string(),
                timeout_seconds: 10,
            },
            bridge: BridgeSettings {
                executable: String::new(),
                fixed_args: vec![],
                timeout_ms: 30_000,
            },
            storage: StorageConfig {
                host: None,
                port: None,
                access_key: None,
                secret_key: None,
                region: "us-east-1".to_string(),
                download_dir: std::env::temp_dir(),
            },
            metrics: MetricsConfig::default(),
        }
    }
}

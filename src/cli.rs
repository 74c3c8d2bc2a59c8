//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged, with
//! the highest priority, over the configuration file and environment variables.

use crate::core::DeliveryBackend;
use clap::Parser;
use figment::{
    value::{Dict, Map, Tag, Value},
    Error, Metadata, Profile, Provider,
};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Relays Grafana alert webhooks to Telegram.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Address for the webhook server, e.g. 0.0.0.0:4000.
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<SocketAddr>,

    /// Delivery backend: direct or bridged.
    #[arg(long, value_name = "BACKEND")]
    pub backend: Option<DeliveryBackend>,

    /// Chat used when an alert has no chatID label.
    #[arg(long, value_name = "ID", allow_hyphen_values = true)]
    pub chat_id: Option<i64>,

    /// Logging level (error, warn, info, debug, trace).
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(listen) = self.listen {
            let mut server = Dict::new();
            server.insert("listen_address".into(), Value::from(listen.to_string()));
            dict.insert("server".into(), Value::Dict(Tag::Default, server));
        }

        let mut delivery = Dict::new();
        if let Some(backend) = self.backend {
            let variant = match backend {
                DeliveryBackend::Direct => "Direct",
                DeliveryBackend::Bridged => "Bridged",
            };
            delivery.insert("backend".into(), Value::from(variant));
        }
        if let Some(chat_id) = self.chat_id {
            delivery.insert("default_chat_id".into(), Value::from(chat_id));
        }
        if !delivery.is_empty() {
            dict.insert("delivery".into(), Value::Dict(Tag::Default, delivery));
        }

        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}

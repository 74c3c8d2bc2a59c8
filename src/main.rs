//! alert-relay - Grafana alert webhooks to Telegram
//!
//! Receives Grafana alerting webhooks and delivers them to Telegram chats,
//! either through the Bot API or through an external bridge program.

use alert_relay::{app::App, cli::Cli, config::Config, core::DeliveryBackend};
use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = Config::load(&cli).unwrap_or_else(|err| {
        init_logging("error");
        error!("Failed to load configuration: {:#}", err);
        std::process::exit(1);
    });

    init_logging(&config.log_level);
    info!("alert-relay starting up...");

    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("Listen Address: {}", config.server.listen_address);
    info!("Delivery Backend: {}", config.delivery.backend);
    match config.delivery.default_chat_id {
        Some(id) => info!("Default Chat ID: {}", id),
        None => info!("Default Chat ID: Not configured"),
    }
    match config.delivery.backend {
        DeliveryBackend::Direct => {
            info!("Telegram API URL: {}", config.telegram.api_url);
            info!("Telegram Timeout: {}s", config.telegram.timeout_seconds);
        }
        DeliveryBackend::Bridged => {
            info!("Bridge Executable: {}", config.bridge.executable);
            info!("Bridge Fixed Args: {:?}", config.bridge.fixed_args);
            info!("Bridge Timeout: {}ms", config.bridge.timeout_ms);
        }
    }
    match (&config.storage.host, config.storage.port) {
        (Some(host), Some(port)) => info!("Image Storage Endpoint: {}:{}", host, port),
        (Some(host), None) => info!("Image Storage Endpoint: {}", host),
        _ => info!("Image Storage Endpoint: as published in alerts"),
    }
    info!(
        "Image Storage Credentials: {}",
        if config.storage.access_key.is_some() { "Configured" } else { "None (unsigned downloads)" }
    );
    info!("Image Download Dir: {}", config.storage.download_dir.display());
    info!(
        "Metrics Endpoint: {}",
        if config.metrics.enabled { "Enabled" } else { "Disabled" }
    );
    info!("-------------------------------------------------------");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let app = App::builder(config).build(shutdown_rx).await?;
    let server = tokio::spawn(app.run());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Shutting down gracefully...");
    if shutdown_tx.send(true).is_err() {
        warn!("Webhook server already stopped");
    }

    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Webhook server failed: {:#}", e),
        Err(e) => error!("Webhook server task panicked: {:?}", e),
    }

    info!("All tasks shut down. Exiting.");
    Ok(())
}

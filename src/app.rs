//! The main application logic, decoupled from the entry point.

use crate::{
    config::Config,
    core::{DeliveryBackend, ImageFetcher, MessengerClient},
    delivery::{BridgeConfig, DeliveryRouter, ProcessBridge},
    formatting::AlertFormatter,
    internal_metrics::MetricsBuilder,
    notification::TelegramClient,
    server::{self, AppState},
    storage::HttpImageFetcher,
};
use anyhow::{Context, Result};
use axum::Router;
use chrono::Local;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, instrument};

/// A bound, ready-to-serve application.
pub struct App {
    listener: TcpListener,
    router: Router,
    local_addr: SocketAddr,
    shutdown_rx: watch::Receiver<bool>,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    /// The address the webhook server is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves webhook requests until the shutdown signal fires.
    pub async fn run(self) -> Result<()> {
        let mut shutdown_rx = self.shutdown_rx;
        info!(addr = %self.local_addr, "Webhook server listening");

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                // A dropped sender also means shutdown.
                while !*shutdown_rx.borrow() {
                    if shutdown_rx.changed().await.is_err() {
                        break;
                    }
                }
                info!("Shutdown signal received, draining requests");
            })
            .await
            .context("webhook server failed")?;

        info!("Webhook server stopped");
        Ok(())
    }
}

/// Builder for the main application.
///
/// Collaborators that talk to the outside world can be replaced for tests.
pub struct AppBuilder {
    config: Config,
    messenger_override: Option<Arc<dyn MessengerClient>>,
    image_fetcher_override: Option<Arc<dyn ImageFetcher>>,
}

impl AppBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            messenger_override: None,
            image_fetcher_override: None,
        }
    }

    /// Overrides the Telegram client for testing.
    pub fn messenger_override(mut self, messenger: Arc<dyn MessengerClient>) -> Self {
        self.messenger_override = Some(messenger);
        self
    }

    /// Overrides the image fetcher for testing.
    pub fn image_fetcher_override(mut self, fetcher: Arc<dyn ImageFetcher>) -> Self {
        self.image_fetcher_override = Some(fetcher);
        self
    }

    /// Builds all components and binds the listener, returning a runnable `App`.
    #[instrument(skip_all)]
    pub async fn build(self, shutdown_rx: watch::Receiver<bool>) -> Result<App> {
        let config = self.config;
        let backend = config.delivery.backend;

        let metrics = MetricsBuilder::new(config.metrics.clone()).build();

        let messenger: Option<Arc<dyn MessengerClient>> = match self.messenger_override {
            Some(messenger) => Some(messenger),
            None => match config.telegram.bot_token.as_deref() {
                Some(token) if !token.is_empty() => Some(Arc::new(
                    TelegramClient::from_config(&config.telegram)
                        .context("failed to build Telegram client")?,
                )),
                _ => None,
            },
        };

        let bridge = (!config.bridge.executable.trim().is_empty())
            .then(|| ProcessBridge::new(BridgeConfig::from(&config.bridge)));

        let router = DeliveryRouter::new(bridge, messenger);
        if !router.supports(backend) {
            anyhow::bail!("the {} delivery backend is not configured", backend);
        }
        if backend == DeliveryBackend::Bridged {
            info!(executable = %config.bridge.executable, "Delivering through the bridge program");
        }

        let fetcher: Arc<dyn ImageFetcher> = match self.image_fetcher_override {
            Some(fetcher) => fetcher,
            None => Arc::new(
                HttpImageFetcher::new(&config.storage).context("failed to build image fetcher")?,
            ),
        };

        let state = Arc::new(AppState {
            router,
            fetcher,
            backend,
            default_chat_id: config.delivery.default_chat_id,
            formatter: AlertFormatter::new(Local),
        });

        let listener = TcpListener::bind(config.server.listen_address)
            .await
            .with_context(|| format!("failed to bind {}", config.server.listen_address))?;
        let local_addr = listener.local_addr()?;

        Ok(App {
            listener,
            router: server::router(state, metrics),
            local_addr,
            shutdown_rx,
        })
    }
}

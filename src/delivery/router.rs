//! Routes each outbound message to the configured backend.

use super::{DeliveryError, ProcessBridge};
use crate::core::{DeliveryBackend, DeliveryOutcome, MessengerClient, OutboundMessage};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Presents one `deliver` call regardless of which backend does the work.
///
/// The router holds no per-call state. The backend is chosen by the caller
/// on every call; a failure on one backend is never retried on the other.
#[derive(Clone)]
pub struct DeliveryRouter {
    bridge: Option<ProcessBridge>,
    messenger: Option<Arc<dyn MessengerClient>>,
}

impl DeliveryRouter {
    pub fn new(bridge: Option<ProcessBridge>, messenger: Option<Arc<dyn MessengerClient>>) -> Self {
        Self { bridge, messenger }
    }

    /// Returns true if `backend` has what it needs to deliver.
    pub fn supports(&self, backend: DeliveryBackend) -> bool {
        match backend {
            DeliveryBackend::Direct => self.messenger.is_some(),
            DeliveryBackend::Bridged => self.bridge.is_some(),
        }
    }

    /// Delivers `message` through `backend`. Never panics and never returns an
    /// error; failures are reported in the outcome.
    #[instrument(skip(self, message), fields(backend = %backend, chat_id = message.destination_id))]
    pub async fn deliver(
        &self,
        message: &OutboundMessage,
        backend: DeliveryBackend,
    ) -> DeliveryOutcome {
        let result = match backend {
            DeliveryBackend::Bridged => self.deliver_bridged(message).await,
            DeliveryBackend::Direct => self.deliver_direct(message).await,
        };

        match result {
            Ok(()) => {
                metrics::counter!(
                    "deliveries_total",
                    "backend" => backend.as_str(),
                    "outcome" => "sent"
                )
                .increment(1);
                info!("Message delivered");
                DeliveryOutcome::sent()
            }
            Err(e) => {
                metrics::counter!(
                    "deliveries_total",
                    "backend" => backend.as_str(),
                    "outcome" => e.kind()
                )
                .increment(1);
                error!(error = %e, kind = e.kind(), "Message delivery failed");
                DeliveryOutcome::failed(e.to_string())
            }
        }
    }

    async fn deliver_bridged(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        let bridge = self
            .bridge
            .as_ref()
            .ok_or(DeliveryError::BackendUnavailable(DeliveryBackend::Bridged))?;

        let output = bridge.invoke(message).await?;
        for line in output.lines().filter(|l| !l.trim().is_empty()) {
            info!("bridge | {}", line);
        }
        Ok(())
    }

    async fn deliver_direct(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        let messenger = self
            .messenger
            .as_ref()
            .ok_or(DeliveryError::BackendUnavailable(DeliveryBackend::Direct))?;

        let Some(path) = &message.attachment_path else {
            messenger.send_text(message.destination_id, &message.text).await?;
            return Ok(());
        };

        match read_attachment(path).await {
            Ok(data) => {
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "image.png".to_string());
                debug!(
                    file_name = %file_name,
                    bytes = data.len(),
                    "Sending message with attachment"
                );
                messenger
                    .send_photo(message.destination_id, &file_name, data, &message.text)
                    .await?;
            }
            Err(e) => {
                // A broken image must never suppress the alert text.
                warn!(error = %e, "Attachment unreadable, falling back to text only");
                metrics::counter!("attachment_fallbacks_total").increment(1);
                messenger.send_text(message.destination_id, &message.text).await?;
            }
        }
        Ok(())
    }
}

async fn read_attachment(path: &Path) -> Result<Vec<u8>, DeliveryError> {
    tokio::fs::read(path)
        .await
        .map_err(|source| DeliveryError::AttachmentRead {
            path: path.to_path_buf(),
            source,
        })
}

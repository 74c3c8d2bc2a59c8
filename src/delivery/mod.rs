//! The notification delivery engine.
//!
//! A [`DeliveryRouter`] takes one [`OutboundMessage`](crate::core::OutboundMessage)
//! at a time and hands it either to the Telegram API client or to a
//! [`ProcessBridge`], which runs an external program per message under a
//! wall-clock timeout. Both paths collapse into a single
//! [`DeliveryOutcome`](crate::core::DeliveryOutcome).

pub mod bridge;
pub mod router;

use crate::core::DeliveryBackend;
use crate::notification::MessengerError;
use std::path::PathBuf;
use thiserror::Error;

pub use bridge::{BridgeConfig, BridgeError, ProcessBridge};
pub use router::DeliveryRouter;

/// Everything that can go wrong while delivering one message.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("messenger error: {0}")]
    Messenger(#[from] MessengerError),

    #[error("cannot read attachment {}: {source}", path.display())]
    AttachmentRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} delivery backend is not configured")]
    BackendUnavailable(DeliveryBackend),
}

impl DeliveryError {
    /// A short, stable label for the error class, used in metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DeliveryError::Bridge(BridgeError::Spawn { .. }) => "spawn",
            DeliveryError::Bridge(BridgeError::Stream { .. }) => "stream",
            DeliveryError::Bridge(BridgeError::Timeout(_)) => "timeout",
            DeliveryError::Bridge(BridgeError::RemoteFailure(_)) => "remote_failure",
            DeliveryError::Messenger(_) => "remote_failure",
            DeliveryError::AttachmentRead { .. } => "attachment_read",
            DeliveryError::BackendUnavailable(_) => "unavailable",
        }
    }
}

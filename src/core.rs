//! Core domain types and service traits for alert-relay
//!
//! This module defines the data that flows between the webhook front door,
//! the delivery router and the messaging backends, together with the trait
//! contracts that let each collaborator be replaced in tests.

use crate::notification::MessengerError;
use crate::storage::{Attachment, FetchError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A single message ready to be handed to the delivery router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Opaque numeric target, e.g. a Telegram chat ID.
    pub destination_id: i64,
    /// The rendered message text.
    pub text: String,
    /// Optional local file to attach, already downloaded.
    pub attachment_path: Option<PathBuf>,
}

impl OutboundMessage {
    /// Creates a text-only message.
    pub fn new(destination_id: i64, text: impl Into<String>) -> Self {
        Self {
            destination_id,
            text: text.into(),
            attachment_path: None,
        }
    }

    /// Attaches a local file to the message.
    pub fn with_attachment(mut self, path: impl Into<PathBuf>) -> Self {
        self.attachment_path = Some(path.into());
        self
    }
}

/// The mechanism used to deliver a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DeliveryBackend {
    /// In-process call to the Telegram Bot API.
    #[default]
    #[serde(alias = "direct")]
    Direct,
    /// External program executed once per message.
    #[serde(alias = "bridged")]
    Bridged,
}

impl DeliveryBackend {
    /// Lowercase label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryBackend::Direct => "direct",
            DeliveryBackend::Bridged => "bridged",
        }
    }
}

impl fmt::Display for DeliveryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeliveryBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct" => Ok(DeliveryBackend::Direct),
            "bridged" | "bridge" => Ok(DeliveryBackend::Bridged),
            other => Err(format!("unknown delivery backend '{}'", other)),
        }
    }
}

/// The result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub success: bool,
    pub error_detail: Option<String>,
}

impl DeliveryOutcome {
    pub fn sent() -> Self {
        Self {
            success: true,
            error_detail: None,
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            error_detail: Some(detail.into()),
        }
    }
}

// =============================================================================
// Service Traits
// =============================================================================

/// A hosted chat API that can deliver text and photos.
#[async_trait]
pub trait MessengerClient: Send + Sync {
    /// Sends a plain text message.
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), MessengerError>;

    /// Sends a photo with `caption` as its accompanying text.
    async fn send_photo(
        &self,
        chat_id: i64,
        file_name: &str,
        data: Vec<u8>,
        caption: &str,
    ) -> Result<(), MessengerError>;
}

/// Retrieves the image referenced by an alert into a local file.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Downloads the image at `image_url`.
    ///
    /// # Returns
    /// * `Ok(None)` when the URL is empty
    /// * `Ok(Some(Attachment))` with a local file that is removed on drop
    /// * `Err` when the URL is malformed or the download fails
    async fn fetch(&self, image_url: &str) -> Result<Option<Attachment>, FetchError>;
}

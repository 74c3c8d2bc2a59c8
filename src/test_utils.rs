//! Test doubles shared by unit and integration tests.

use crate::core::{ImageFetcher, MessengerClient};
use crate::notification::MessengerError;
use crate::storage::{Attachment, FetchError};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// A record of one call made against [`MockMessenger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentMessage {
    Text {
        chat_id: i64,
        text: String,
    },
    Photo {
        chat_id: i64,
        file_name: String,
        bytes: usize,
        caption: String,
    },
}

/// A messenger that records every send and optionally fails them all.
#[derive(Debug, Clone, Default)]
pub struct MockMessenger {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    fail_with: Option<String>,
}

impl MockMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A messenger whose every call returns `MessengerError::Api(description)`.
    pub fn failing(description: &str) -> Self {
        Self {
            sent: Arc::default(),
            fail_with: Some(description.to_string()),
        }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    fn record(&self, message: SentMessage) -> Result<(), MessengerError> {
        if let Some(description) = &self.fail_with {
            return Err(MessengerError::Api(description.clone()));
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

#[async_trait]
impl MessengerClient for MockMessenger {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), MessengerError> {
        self.record(SentMessage::Text {
            chat_id,
            text: text.to_string(),
        })
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        file_name: &str,
        data: Vec<u8>,
        caption: &str,
    ) -> Result<(), MessengerError> {
        self.record(SentMessage::Photo {
            chat_id,
            file_name: file_name.to_string(),
            bytes: data.len(),
            caption: caption.to_string(),
        })
    }
}

/// An image fetcher that writes fixed bytes into a directory, or fails.
#[derive(Debug, Clone)]
pub struct FakeImageFetcher {
    dir: PathBuf,
    fail: bool,
    requested: Arc<Mutex<Vec<String>>>,
}

impl FakeImageFetcher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            fail: false,
            requested: Arc::default(),
        }
    }

    pub fn failing(dir: impl Into<PathBuf>) -> Self {
        Self {
            fail: true,
            ..Self::new(dir)
        }
    }

    /// Image URLs this fetcher was asked for, in order.
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageFetcher for FakeImageFetcher {
    async fn fetch(&self, image_url: &str) -> Result<Option<Attachment>, FetchError> {
        if image_url.is_empty() {
            return Ok(None);
        }
        self.requested.lock().unwrap().push(image_url.to_string());
        if self.fail {
            return Err(FetchError::Status(503));
        }
        let name = image_url.rsplit('/').next().unwrap_or("image.png");
        let path = self.dir.join(name);
        tokio::fs::write(&path, b"fake image").await?;
        Ok(Some(Attachment::new(path)))
    }
}

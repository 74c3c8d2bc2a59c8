//! Clients for hosted messaging APIs.
//!
//! The delivery router talks to these through the
//! [`MessengerClient`](crate::core::MessengerClient) trait, so tests can swap
//! in a recording double.
pub mod telegram;

use thiserror::Error;

pub use telegram::TelegramClient;

#[derive(Debug, Error)]
pub enum MessengerError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned an error: {0}")]
    Api(String),
}

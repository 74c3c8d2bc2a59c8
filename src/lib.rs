/// alert-relay - Grafana alert webhooks delivered to Telegram
///
/// This library receives alert notifications over HTTP, renders them into
/// chat messages and delivers them either through the Telegram Bot API or
/// through an external bridge program run as a short-lived child process.
pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod delivery;
pub mod formatting;
pub mod internal_metrics;
pub mod notification;
pub mod payload;
pub mod server;
pub mod storage;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export core types for convenience
pub use crate::core::*;

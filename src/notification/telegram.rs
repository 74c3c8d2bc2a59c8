//! A client for sending notifications through the Telegram Bot API.

use super::MessengerError;
use crate::config::TelegramConfig;
use crate::core::MessengerClient;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

/// The envelope every Bot API method answers with.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

/// A client for the `sendMessage` and `sendPhoto` Bot API methods.
pub struct TelegramClient {
    client: Client,
    base_url: String,
}

impl TelegramClient {
    /// Creates a new `TelegramClient` against `api_url` (normally
    /// `https://api.telegram.org`, or a self-hosted Bot API server).
    pub fn new(bot_token: &str, api_url: &str, timeout: Duration) -> Result<Self, MessengerError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), bot_token),
        })
    }

    /// Builds a client from the `[telegram]` configuration section.
    pub fn from_config(config: &TelegramConfig) -> Result<Self, MessengerError> {
        let token = config
            .bot_token
            .as_deref()
            .ok_or_else(|| MessengerError::Api("no bot token configured".to_string()))?;
        Self::new(token, &config.api_url, Duration::from_secs(config.timeout_seconds))
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    /// Maps a Bot API answer to `Ok(())` or the API's own error description.
    async fn check_response(method: &str, response: Response) -> Result<(), MessengerError> {
        let status = response.status();
        let body = response.text().await?;
        match serde_json::from_str::<ApiResponse>(&body) {
            Ok(api) if api.ok && status.is_success() => Ok(()),
            Ok(api) => {
                let description = api
                    .description
                    .unwrap_or_else(|| format!("status {}", status));
                error!(
                    method,
                    status = %status,
                    description = %description,
                    "Telegram API call failed"
                );
                Err(MessengerError::Api(description))
            }
            Err(_) => {
                error!(method, status = %status, body = %body, "Unexpected Telegram API response");
                Err(MessengerError::Api(format!("status {}", status)))
            }
        }
    }
}

#[async_trait]
impl MessengerClient for TelegramClient {
    #[instrument(skip(self, text), fields(len = text.len()))]
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), MessengerError> {
        debug!("sendMessage to chat_id={}", chat_id);
        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&json!({ "chat_id": chat_id, "text": text }))
            .send()
            .await?;
        Self::check_response("sendMessage", response).await?;
        info!("Successfully sent message to Telegram.");
        Ok(())
    }

    #[instrument(skip(self, data, caption), fields(bytes = data.len()))]
    async fn send_photo(
        &self,
        chat_id: i64,
        file_name: &str,
        data: Vec<u8>,
        caption: &str,
    ) -> Result<(), MessengerError> {
        debug!("sendPhoto to chat_id={}", chat_id);
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part("photo", Part::bytes(data).file_name(file_name.to_string()));
        let response = self
            .client
            .post(self.method_url("sendPhoto"))
            .multipart(form)
            .send()
            .await?;
        Self::check_response("sendPhoto", response).await?;
        info!("Successfully sent photo to Telegram.");
        Ok(())
    }
}

#[cfg(test)]
mod telegram_client_tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> TelegramClient {
        TelegramClient::new("TOKEN", &server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_send_text_success() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .and(body_json(json!({ "chat_id": 42, "text": "CPU high" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": {} })),
            )
            .expect(1)
            .mount(&server)
            .await;

        // Act
        let result = client_for(&server).send_text(42, "CPU high").await;

        // Assert
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_send_text_surfaces_api_description() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: chat not found"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).send_text(1, "x").await.unwrap_err();

        assert!(matches!(err, MessengerError::Api(ref d) if d == "Bad Request: chat not found"));
    }

    #[tokio::test]
    async fn test_send_photo_uses_multipart() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendPhoto"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;

        let result = client_for(&server)
            .send_photo(42, "panel.png", b"\x89PNG".to_vec(), "CPU high")
            .await;

        assert!(result.is_ok());
        let requests = server.received_requests().await.unwrap();
        let content_type = requests[0]
            .headers
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(content_type.starts_with("multipart/form-data"));
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains("filename=\"panel.png\""));
        assert!(body.contains("CPU high"));
    }

    #[tokio::test]
    async fn test_non_json_error_page() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).send_text(1, "x").await.unwrap_err();

        assert!(matches!(err, MessengerError::Api(ref d) if d.contains("502")));
    }
}

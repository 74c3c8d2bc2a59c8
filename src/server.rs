//! The webhook front door.
//!
//! Grafana posts alert groups here. `/alert` delivers one message per alert,
//! `/notify` delivers the group's rendered message once. Both answer with a
//! small JSON body so Grafana's contact point test shows the outcome.

use crate::core::{DeliveryBackend, ImageFetcher, OutboundMessage};
use crate::delivery::DeliveryRouter;
use crate::formatting::{destination_for, group_destination, log_framed, AlertFormatter};
use crate::payload::WebhookBody;
use crate::storage::Attachment;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Local;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Shared state for all request handlers.
pub struct AppState {
    pub router: DeliveryRouter,
    pub fetcher: Arc<dyn ImageFetcher>,
    pub backend: DeliveryBackend,
    pub default_chat_id: Option<i64>,
    pub formatter: AlertFormatter<Local>,
}

impl AppState {
    /// Downloads an alert image. Failures are logged and yield no image.
    async fn fetch_image(&self, image_url: &str) -> Option<Attachment> {
        match self.fetcher.fetch(image_url).await {
            Ok(attachment) => attachment,
            Err(e) => {
                metrics::counter!("image_fetch_failures_total").increment(1);
                warn!(
                    url = %image_url,
                    error = %e,
                    "Could not fetch alert image, sending without it"
                );
                None
            }
        }
    }

    async fn send(
        &self,
        chat_id: i64,
        text: String,
        attachment: Option<&Attachment>,
    ) -> Result<(), String> {
        let mut message = OutboundMessage::new(chat_id, text);
        if let Some(attachment) = attachment {
            message = message.with_attachment(attachment.path());
        }
        let outcome = self.router.deliver(&message, self.backend).await;
        if outcome.success {
            Ok(())
        } else {
            Err(outcome.error_detail.unwrap_or_default())
        }
    }
}

/// Builds the axum router. `/metrics` is mounted only when a handle is given.
pub fn router(state: Arc<AppState>, metrics: Option<PrometheusHandle>) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/alert", post(alert))
        .route("/notify", post(notify));

    if let Some(handle) = metrics {
        app = app.route("/metrics", get(move || async move { handle.render() }));
    }

    app.with_state(state)
}

fn success() -> Response {
    (StatusCode::CREATED, Json(json!({ "result": "success" }))).into_response()
}

fn failure(message: impl Into<String>) -> Response {
    let message = message.into();
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "result": "error", "message": message })),
    )
        .into_response()
}

fn decode(endpoint: &'static str, body: &Bytes) -> Result<WebhookBody, Response> {
    metrics::counter!("webhook_requests_total", "endpoint" => endpoint).increment(1);
    serde_json::from_slice(body).map_err(|e| {
        warn!(endpoint, error = %e, "Rejected webhook body");
        failure("Invalid JSON Format")
    })
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "result": "success" })))
}

#[instrument(skip_all)]
async fn alert(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let body = match decode("alert", &body) {
        Ok(body) => body,
        Err(response) => return response,
    };
    info!(
        receiver = %body.receiver,
        status = %body.status,
        alerts = body.alerts.len(),
        "Alert group received"
    );

    for alert in &body.alerts {
        let text = state.formatter.format(alert);
        log_framed(&text);

        let Some(chat_id) = destination_for(alert, state.default_chat_id) else {
            warn!(fingerprint = %alert.fingerprint, "Alert has no destination chat, skipping");
            continue;
        };

        let attachment = state.fetch_image(&alert.image_url).await;
        if let Err(detail) = state.send(chat_id, text, attachment.as_ref()).await {
            return failure(format!("Telegram send error: {}", detail));
        }
    }

    success()
}

#[instrument(skip_all)]
async fn notify(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let body = match decode("notify", &body) {
        Ok(body) => body,
        Err(response) => return response,
    };
    info!(
        receiver = %body.receiver,
        status = %body.status,
        alerts = body.alerts.len(),
        "Notification received"
    );

    let (chat_id, image_alert) = group_destination(&body, state.default_chat_id);
    let Some(chat_id) = chat_id else {
        warn!("Notification has no valid destination chat");
        return failure("Incorrect Telegram chatID");
    };
    log_framed(&body.message);

    let attachment = match image_alert {
        Some(alert) => state.fetch_image(&alert.image_url).await,
        None => None,
    };
    match state.send(chat_id, body.message.clone(), attachment.as_ref()).await {
        Ok(()) => success(),
        Err(_) => failure("Telegram send error"),
    }
}

#![allow(dead_code)]

pub mod bridge;

use alert_relay::config::Config;
use alert_relay::core::DeliveryBackend;
use std::net::SocketAddr;

/// A config that binds an ephemeral port and delivers directly.
pub fn test_config(default_chat_id: Option<i64>) -> Config {
    let mut config = Config::default();
    config.server.listen_address = SocketAddr::from(([127, 0, 0, 1], 0));
    config.delivery.backend = DeliveryBackend::Direct;
    config.delivery.default_chat_id = default_chat_id;
    config.telegram.bot_token = Some("123:test".to_string());
    config
}

/// A minimal Grafana webhook body with one firing alert.
pub fn firing_webhook(alertname: &str, chat_id: Option<&str>, image_url: &str) -> String {
    let mut labels = serde_json::json!({ "alertname": alertname });
    if let Some(chat_id) = chat_id {
        labels["chatID"] = serde_json::json!(chat_id);
    }
    serde_json::json!({
        "receiver": "relay",
        "status": "firing",
        "alerts": [{
            "status": "firing",
            "labels": labels,
            "annotations": { "summary": format!("{} summary", alertname) },
            "startsAt": "2025-04-27T10:07:50Z",
            "endsAt": "0001-01-01T00:00:00Z",
            "values": { "A": 42.0 },
            "imageURL": image_url
        }],
        "message": format!("{} group message", alertname)
    })
    .to_string()
}

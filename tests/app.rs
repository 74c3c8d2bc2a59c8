mod helpers;

use alert_relay::app::App;
use alert_relay::core::DeliveryBackend;
use alert_relay::test_utils::{FakeImageFetcher, MockMessenger, SentMessage};
use helpers::{firing_webhook, test_config};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn alert_flows_from_webhook_to_telegram_api() {
    let telegram = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:test/sendMessage"))
        .and(body_partial_json(serde_json::json!({ "chat_id": 555 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
        .expect(1)
        .mount(&telegram)
        .await;

    let mut config = test_config(Some(555));
    config.telegram.api_url = telegram.uri();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let app = App::builder(config).build(shutdown_rx).await.unwrap();
    let addr = app.local_addr();
    let server = tokio::spawn(app.run());

    let response = reqwest::Client::new()
        .post(format!("http://{}/alert", addr))
        .header("content-type", "application/json")
        .body(firing_webhook("HighCPU", None, ""))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["result"], "success");

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
    telegram.verify().await;
}

#[tokio::test]
async fn telegram_rejection_is_reported_to_grafana() {
    let telegram = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "ok": false,
            "description": "Bad Request: chat not found"
        })))
        .mount(&telegram)
        .await;

    let mut config = test_config(Some(1));
    config.telegram.api_url = telegram.uri();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let app = App::builder(config).build(shutdown_rx).await.unwrap();
    let addr = app.local_addr();
    tokio::spawn(app.run());

    let response = reqwest::Client::new()
        .post(format!("http://{}/alert", addr))
        .body(firing_webhook("HighCPU", None, ""))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["message"].as_str().unwrap().contains("chat not found"));
}

#[tokio::test]
async fn notify_uses_overridden_collaborators() {
    let dir = tempfile::tempdir().unwrap();
    let messenger = Arc::new(MockMessenger::new());
    let fetcher = Arc::new(FakeImageFetcher::new(dir.path()));

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let app = App::builder(test_config(None))
        .messenger_override(messenger.clone())
        .image_fetcher_override(fetcher.clone())
        .build(shutdown_rx)
        .await
        .unwrap();
    let addr = app.local_addr();
    tokio::spawn(app.run());

    let response = reqwest::Client::new()
        .post(format!("http://{}/notify", addr))
        .body(firing_webhook("Disk", Some("-100200"), "http://minio:9000/grafana/disk.png"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 201);
    assert_eq!(fetcher.requested(), vec!["http://minio:9000/grafana/disk.png"]);
    assert_eq!(
        messenger.sent(),
        vec![SentMessage::Photo {
            chat_id: -100200,
            file_name: "disk.png".to_string(),
            bytes: b"fake image".len(),
            caption: "Disk group message".to_string(),
        }]
    );
    // The downloaded image is removed once the request completes.
    assert!(!dir.path().join("disk.png").exists());
}

#[tokio::test]
async fn unconfigured_backend_fails_the_build() {
    let mut config = test_config(None);
    config.delivery.backend = DeliveryBackend::Bridged;
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let result = App::builder(config).build(shutdown_rx).await;

    let err = result.err().expect("build should fail").to_string();
    assert!(err.contains("bridged delivery backend is not configured"), "{}", err);
}

#[tokio::test]
async fn health_endpoint_answers() {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let app = App::builder(test_config(None)).build(shutdown_rx).await.unwrap();
    let addr = app.local_addr();
    let server = tokio::spawn(app.run());

    let response = reqwest::get(format!("http://{}/health", addr)).await.unwrap();
    assert_eq!(response.status(), 200);

    drop(shutdown_tx);
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not stop after the sender was dropped")
        .unwrap()
        .unwrap();
}

//! Grafana alerting webhook payload.
//!
//! Every field is optional on the wire; unknown fields are ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// The top-level body of a webhook notification: one alert group.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct WebhookBody {
    /// Name of the contact point.
    pub receiver: String,
    /// `firing` or `resolved`.
    pub status: String,
    pub org_id: i64,
    pub alerts: Vec<AlertBody>,
    pub group_labels: HashMap<String, String>,
    pub common_labels: HashMap<String, String>,
    pub common_annotations: HashMap<String, String>,
    #[serde(rename = "externalURL")]
    pub external_url: String,
    pub version: String,
    pub truncated_alerts: i64,
    pub title: String,
    /// `alerting` or `ok`.
    pub state: String,
    /// Group message rendered by the notification template.
    pub message: String,
}

/// A single alert within a group.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AlertBody {
    pub status: String,
    pub labels: HashMap<String, String>,
    pub annotations: HashMap<String, Value>,
    /// RFC 3339 start time.
    pub starts_at: String,
    /// RFC 3339 end time; `0001-01-01T00:00:00Z` while unresolved.
    pub ends_at: String,
    /// Query results that triggered the alert, keyed by ref ID.
    pub values: HashMap<String, Value>,
    #[serde(rename = "generatorURL")]
    pub generator_url: String,
    pub fingerprint: String,
    #[serde(rename = "silenceURL")]
    pub silence_url: String,
    #[serde(rename = "dashboardURL")]
    pub dashboard_url: String,
    /// Screenshot of the panel the rule is attached to, if any.
    #[serde(rename = "imageURL")]
    pub image_url: String,
}

impl AlertBody {
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }

    pub fn has_image(&self) -> bool {
        !self.image_url.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_grafana_payload() {
        let body: WebhookBody = serde_json::from_str(
            r#"{
                "receiver": "webhook",
                "status": "firing",
                "orgId": 1,
                "alerts": [{
                    "status": "firing",
                    "labels": {"alertname": "Test1-CPU-System", "grafana_folder": "Test"},
                    "annotations": {"summary": "CPU system is above 15%"},
                    "startsAt": "2025-04-27T13:07:50+03:00",
                    "endsAt": "0001-01-01T00:00:00Z",
                    "values": {"A": 18.199999999999363, "C": 1},
                    "imageURL": "http://minio:9000/mybucket/QZuBKH4o25RwnGnkXz9G.png",
                    "panelURL": "http://grafana/d/x?viewPanel=3",
                    "valueString": "[ var='A' value=18.2 ]"
                }],
                "externalURL": "http://grafana:3000/",
                "groupKey": "{}:{alertname=\"Test1-CPU-System\"}",
                "truncatedAlerts": 0,
                "version": "1",
                "title": "[FIRING:1] Test1-CPU-System Test",
                "state": "alerting",
                "message": "**Firing**"
            }"#,
        )
        .unwrap();

        assert_eq!(body.org_id, 1);
        assert_eq!(body.external_url, "http://grafana:3000/");
        let alert = &body.alerts[0];
        assert_eq!(alert.label("alertname"), Some("Test1-CPU-System"));
        assert!(alert.has_image());
        assert_eq!(alert.values["C"], serde_json::json!(1));
    }
}

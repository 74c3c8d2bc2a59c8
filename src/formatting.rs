// src/formatting.rs

use crate::payload::{AlertBody, WebhookBody};
use chrono::{DateTime, Datelike, Duration, TimeZone};
use serde_json::Value;
use std::fmt::Display;
use tracing::{info, warn};

const BANNER: &str = "**********************";
const BANNER_FIRING: &str = "****** FIRING ! ******";
const BANNER_RESOLVED: &str = "****** Resolving *****";
const BANNER_MESSAGE: &str = "****** Message *******";
const TIME_LAYOUT: &str = "%d.%m %H:%M:%S";

/// Label carrying the per-alert destination chat.
pub const CHAT_ID_LABEL: &str = "chatID";

/// Renders single alerts into chat text, with timestamps in `tz`.
#[derive(Debug, Clone)]
pub struct AlertFormatter<Tz: TimeZone> {
    tz: Tz,
}

impl<Tz> AlertFormatter<Tz>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn format(&self, alert: &AlertBody) -> String {
        let banner = match alert.status.as_str() {
            "firing" => BANNER_FIRING,
            "resolved" => BANNER_RESOLVED,
            _ => BANNER,
        };
        let mut lines = vec![banner.to_string()];

        let rule_name = alert.label("rulename").unwrap_or_default();
        let mut show_summary = true;
        match alert.label("alertname").unwrap_or_default() {
            "DatasourceNoData" => {
                lines.push(format!("No data for rule \"{}\"", rule_name));
                show_summary = false;
            }
            "DatasourceError" => {
                lines.push(format!("Datasource error for rule \"{}\"", rule_name));
                show_summary = false;
            }
            name => lines.push(name.to_string()),
        }

        let starts = DateTime::parse_from_rfc3339(&alert.starts_at).ok();
        match &starts {
            Some(ts) => lines.push(format!("Starts: {}", self.local(ts))),
            None => lines.push("Starts: unknown".to_string()),
        }

        // Grafana reports unresolved alerts as ending in year 1.
        if let Some(te) = DateTime::parse_from_rfc3339(&alert.ends_at)
            .ok()
            .filter(|te| te.year() != 1)
        {
            lines.push(format!("Ends  : {}", self.local(&te)));
            if let Some(ts) = &starts {
                lines.push(format!("Elapsed: {}", go_duration(te.signed_duration_since(*ts))));
            }
        }

        let value_name = alert.label("valuename").unwrap_or("A");
        if let Some(value) = alert.values.get(value_name) {
            lines.push(format!("Value : {}", format_value(value)));
        }

        match alert.annotations.get("summary").filter(|_| show_summary) {
            Some(summary) => {
                lines.push(BANNER_MESSAGE.to_string());
                lines.push(value_text(summary));
            }
            None => lines.push(BANNER.to_string()),
        }

        lines.join("\n")
    }

    fn local<T: TimeZone>(&self, ts: &DateTime<T>) -> String {
        ts.with_timezone(&self.tz).format(TIME_LAYOUT).to_string()
    }
}

/// Resolves the chat for a single alert: its `chatID` label, or `default`
/// when the label is absent. A malformed label yields `None`.
pub fn destination_for(alert: &AlertBody, default: Option<i64>) -> Option<i64> {
    match alert.label(CHAT_ID_LABEL) {
        Some(raw) => parse_chat_id(raw),
        None => default,
    }
}

/// Picks the chat and the image-bearing alert for a whole group.
///
/// The first alert with an image decides the chat through its own label.
/// Before that alert is reached, the first valid label seen is remembered.
/// When nothing matches, `default` is used.
pub fn group_destination(
    body: &WebhookBody,
    default: Option<i64>,
) -> (Option<i64>, Option<&AlertBody>) {
    let mut chat_id = None;
    let mut image_alert = None;

    for alert in &body.alerts {
        if alert.has_image() {
            image_alert = Some(alert);
            if let Some(raw) = alert.label(CHAT_ID_LABEL) {
                chat_id = parse_chat_id(raw);
            }
            break;
        }
        if chat_id.is_none() {
            if let Some(raw) = alert.label(CHAT_ID_LABEL) {
                chat_id = parse_chat_id(raw);
            }
        }
    }

    (chat_id.or(default), image_alert)
}

fn parse_chat_id(raw: &str) -> Option<i64> {
    match raw.trim().parse::<i64>() {
        Ok(id) => Some(id),
        Err(e) => {
            warn!(label = %raw, error = %e, "chatID label is not a valid integer");
            None
        }
    }
}

/// Logs `text` line by line inside a frame so multi-line messages stay readable.
pub fn log_framed(text: &str) {
    info!("   +");
    for line in text.lines() {
        info!("   | {}", line);
    }
    info!("   +");
}

fn format_value(value: &Value) -> String {
    match value.as_f64() {
        Some(number) => format!("{:8.2}", number),
        None => value_text(value),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Renders a duration the way Go's `time.Duration` prints, e.g. `1h2m3s`.
pub fn go_duration(d: Duration) -> String {
    let sign = if d < Duration::zero() { "-" } else { "" };
    let d = d.abs();
    let secs = d.num_seconds();
    let nanos = (d - Duration::seconds(secs)).num_nanoseconds().unwrap_or(0);

    if secs == 0 {
        return match nanos {
            0 => "0s".to_string(),
            n if n < 1_000 => format!("{}{}ns", sign, n),
            n if n < 1_000_000 => format!("{}{}µs", sign, decimal(n / 1_000, n % 1_000, 3)),
            n => format!("{}{}ms", sign, decimal(n / 1_000_000, n % 1_000_000, 6)),
        };
    }

    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = decimal(secs % 60, nanos, 9);
    if hours > 0 {
        format!("{}{}h{}m{}s", sign, hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}{}m{}s", sign, minutes, seconds)
    } else {
        format!("{}{}s", sign, seconds)
    }
}

/// `whole.fraction` with `digits` fractional digits, trailing zeros dropped.
fn decimal(whole: i64, fraction: i64, digits: usize) -> String {
    if fraction == 0 {
        return whole.to_string();
    }
    let fraction = format!("{:0width$}", fraction, width = digits);
    format!("{}.{}", whole, fraction.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use serde_json::json;
    use std::collections::HashMap;

    fn formatter() -> AlertFormatter<FixedOffset> {
        AlertFormatter::new(FixedOffset::east_opt(3 * 3600).unwrap())
    }

    fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn firing_alert() -> AlertBody {
        AlertBody {
            status: "firing".to_string(),
            labels: labels(&[("alertname", "Test1-CPU-System")]),
            annotations: HashMap::from([("summary".to_string(), json!("CPU system is above 15%"))]),
            starts_at: "2025-04-27T10:07:50Z".to_string(),
            ends_at: "0001-01-01T00:00:00Z".to_string(),
            values: HashMap::from([("A".to_string(), json!(18.199999999999363))]),
            ..Default::default()
        }
    }

    #[test]
    fn formats_firing_alert_with_summary() {
        let text = formatter().format(&firing_alert());
        assert_eq!(
            text,
            "****** FIRING ! ******\n\
             Test1-CPU-System\n\
             Starts: 27.04 13:07:50\n\
             Value :    18.20\n\
             ****** Message *******\n\
             CPU system is above 15%"
        );
    }

    #[test]
    fn resolved_alert_shows_end_and_elapsed() {
        let mut alert = firing_alert();
        alert.status = "resolved".to_string();
        alert.ends_at = "2025-04-27T11:09:53Z".to_string();
        let text = formatter().format(&alert);
        assert!(text.starts_with("****** Resolving *****\n"));
        assert!(text.contains("Ends  : 27.04 14:09:53\nElapsed: 1h2m3s\n"));
    }

    #[test]
    fn datasource_errors_hide_the_summary() {
        let mut alert = firing_alert();
        alert.labels = labels(&[("alertname", "DatasourceNoData"), ("rulename", "disk")]);
        let text = formatter().format(&alert);
        assert!(text.contains("No data for rule \"disk\""));
        assert!(!text.contains("CPU system"));
        assert!(text.ends_with(BANNER));
    }

    #[test]
    fn valuename_label_selects_the_value() {
        let mut alert = firing_alert();
        alert.labels.insert("valuename".to_string(), "B".to_string());
        alert.values.insert("B".to_string(), json!("n/a"));
        let text = formatter().format(&alert);
        assert!(text.contains("Value : n/a"));
    }

    #[test]
    fn unknown_status_and_bad_timestamp() {
        let alert = AlertBody {
            status: "pending".to_string(),
            starts_at: "yesterday".to_string(),
            ..Default::default()
        };
        let text = formatter().format(&alert);
        assert_eq!(text, format!("{}\n\nStarts: unknown\n{}", BANNER, BANNER));
    }

    #[test]
    fn destination_prefers_label_then_default() {
        let mut alert = firing_alert();
        assert_eq!(destination_for(&alert, Some(7)), Some(7));
        assert_eq!(destination_for(&alert, None), None);
        alert.labels.insert(CHAT_ID_LABEL.to_string(), "-1001234".to_string());
        assert_eq!(destination_for(&alert, Some(7)), Some(-1001234));
        alert.labels.insert(CHAT_ID_LABEL.to_string(), "ops".to_string());
        assert_eq!(destination_for(&alert, Some(7)), None);
    }

    #[test]
    fn group_destination_follows_the_image_alert() {
        let plain = AlertBody {
            labels: labels(&[(CHAT_ID_LABEL, "11")]),
            ..Default::default()
        };
        let with_image = AlertBody {
            labels: labels(&[(CHAT_ID_LABEL, "22")]),
            image_url: "http://minio:9000/b/p.png".to_string(),
            ..Default::default()
        };
        let body = WebhookBody {
            alerts: vec![plain.clone(), with_image.clone()],
            ..Default::default()
        };

        let (chat, image) = group_destination(&body, Some(1));
        assert_eq!(chat, Some(22));
        assert_eq!(image, Some(&with_image));

        let body = WebhookBody {
            alerts: vec![plain],
            ..Default::default()
        };
        assert_eq!(group_destination(&body, Some(1)), (Some(11), None));
        assert_eq!(group_destination(&WebhookBody::default(), None), (None, None));
    }

    #[test]
    fn go_style_durations() {
        assert_eq!(go_duration(Duration::zero()), "0s");
        assert_eq!(go_duration(Duration::seconds(45)), "45s");
        assert_eq!(go_duration(Duration::seconds(120)), "2m0s");
        assert_eq!(go_duration(Duration::seconds(3723)), "1h2m3s");
        assert_eq!(go_duration(Duration::milliseconds(1500)), "1.5s");
        assert_eq!(go_duration(Duration::milliseconds(250)), "250ms");
        assert_eq!(go_duration(Duration::seconds(-5)), "-5s");
    }
}

//! # Internal Metrics Module
//!
//! Sets up the Prometheus recorder and registers descriptions for every
//! metric the relay emits. Metrics are recorded at the call site with the
//! `metrics` macros; when no recorder is installed those calls are no-ops.
//!
//! The rendered exposition is served by the webhook server at `/metrics`.

use crate::config::MetricsConfig;
use metrics::Unit;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use tracing::{info, warn};

/// Registers descriptions for all metrics with the global recorder.
pub fn describe_metrics() {
    metrics::describe_counter!(
        "deliveries_total",
        Unit::Count,
        "Total number of delivery attempts, labeled by backend and outcome."
    );
    metrics::describe_histogram!(
        "bridge_invocation_duration_seconds",
        Unit::Seconds,
        "Wall-clock time of each bridge program invocation."
    );
    metrics::describe_counter!(
        "bridge_timeouts_total",
        Unit::Count,
        "Total number of bridge invocations killed after exceeding the timeout."
    );
    metrics::describe_counter!(
        "attachment_fallbacks_total",
        Unit::Count,
        "Total number of direct deliveries sent as text because the attachment could not be read."
    );
    metrics::describe_counter!(
        "webhook_requests_total",
        Unit::Count,
        "Total number of webhook requests received, labeled by endpoint."
    );
    metrics::describe_counter!(
        "image_fetch_failures_total",
        Unit::Count,
        "Total number of alert images that could not be downloaded."
    );
}

/// Builder for the metrics system.
pub struct MetricsBuilder {
    config: MetricsConfig,
}

impl MetricsBuilder {
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    /// Installs the Prometheus recorder and returns a handle for rendering.
    ///
    /// Returns `None` when metrics are disabled. If another recorder is
    /// already installed the handle is still returned, but it renders only
    /// what its own recorder sees.
    pub fn build(self) -> Option<PrometheusHandle> {
        if !self.config.enabled {
            return None;
        }

        let builder = PrometheusBuilder::new();
        let builder = match builder.set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0],
        ) {
            Ok(builder) => builder,
            Err(e) => {
                warn!(error = %e, "Invalid histogram buckets, using defaults");
                PrometheusBuilder::new()
            }
        };
        let recorder = builder.build_recorder();
        let handle = recorder.handle();

        match metrics::set_global_recorder(recorder) {
            Ok(()) => {
                describe_metrics();
                info!("Prometheus recorder installed");
            }
            Err(e) => warn!(error = %e, "A metrics recorder is already installed"),
        }
        Some(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_metrics_yield_no_handle() {
        assert!(MetricsBuilder::new(MetricsConfig { enabled: false }).build().is_none());
    }

    #[test]
    fn enabled_metrics_render() {
        let handle = MetricsBuilder::new(MetricsConfig { enabled: true }).build().unwrap();
        metrics::counter!("webhook_requests_total", "endpoint" => "test").increment(1);

        let rendered = handle.render();
        assert!(rendered.contains(r#"webhook_requests_total{endpoint="test"} 1"#), "{}", rendered);
    }
}

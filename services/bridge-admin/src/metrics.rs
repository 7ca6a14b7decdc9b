//! Prometheus metrics exposition
//!
//! - `bridge_commands_total` (counter): labels `command`, `outcome`
//! - `bridge_oauth_callbacks_total` (counter): label `outcome`

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// The handle's `render()` method produces the Prometheus text exposition format
/// suitable for serving on a `/metrics` endpoint.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record one admin command. `command` is the resolved command name, or
/// `"unknown"` when routing failed.
pub fn record_command(command: &str, outcome: &str) {
    metrics::counter!(
        "bridge_commands_total",
        "command" => command.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record an OAuth callback result.
pub fn record_oauth_callback(outcome: &str) {
    metrics::counter!("bridge_oauth_callbacks_total", "outcome" => outcome.to_string())
        .increment(1);
}

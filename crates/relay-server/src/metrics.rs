//! Prometheus metrics recorder and `/metrics` endpoint handler.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{info, warn};

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// When a global recorder already exists (a second server in the same
/// process), a detached recorder is returned instead; its rendering is
/// empty but the server stays functional.
pub fn install_recorder() -> PrometheusHandle {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            info!("prometheus metrics recorder installed");
            handle
        }
        Err(e) => {
            warn!(error = %e, "global metrics recorder already set, using detached recorder");
            PrometheusBuilder::new().build_recorder().handle()
        }
    }
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants to avoid typos across modules.

/// Connections opened total (counter).
pub const CONNECTIONS_OPENED_TOTAL: &str = "relay_connections_opened_total";
/// Connections closed total (counter).
pub const CONNECTIONS_CLOSED_TOTAL: &str = "relay_connections_closed_total";
/// Active connections (gauge).
pub const CONNECTIONS_ACTIVE: &str = "relay_connections_active";
/// Inbound frames received total (counter).
pub const MESSAGES_RECEIVED_TOTAL: &str = "relay_messages_received_total";
/// Frames routed to a recipient queue total (counter).
pub const MESSAGES_ROUTED_TOTAL: &str = "relay_messages_routed_total";
/// Deliveries dropped on a full client queue (counter).
pub const DELIVERY_DROPS_TOTAL: &str = "relay_delivery_drops_total";
/// Inbound frames rejected by validation (counter, labels: code).
pub const VALIDATION_REJECTS_TOTAL: &str = "relay_validation_rejects_total";
/// Events dropped because a hub queue was full (counter).
pub const HUB_QUEUE_DROPS_TOTAL: &str = "relay_hub_queue_drops_total";
/// Connection duration seconds (histogram).
pub const CONNECTION_DURATION_SECONDS: &str = "relay_connection_duration_seconds";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_and_render() {
        // Build a recorder + handle (no global install to avoid test conflicts).
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let output = handle.render();
        assert!(output.is_empty() || output.contains('#') || output.contains('\n'));
    }

    #[test]
    fn metric_constants_are_snake_case() {
        let names = [
            CONNECTIONS_OPENED_TOTAL,
            CONNECTIONS_CLOSED_TOTAL,
            CONNECTIONS_ACTIVE,
            MESSAGES_RECEIVED_TOTAL,
            MESSAGES_ROUTED_TOTAL,
            DELIVERY_DROPS_TOTAL,
            VALIDATION_REJECTS_TOTAL,
            HUB_QUEUE_DROPS_TOTAL,
            CONNECTION_DURATION_SECONDS,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}

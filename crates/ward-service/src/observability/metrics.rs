//! Metrics definitions for the ward service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `ward_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded: `method` (HTTP verbs), `endpoint` (parameterized
//! paths, dynamic segments normalized), `status_code`, and `operation`
//! (state-machine operation names). Doctor names and appointment ids
//! never appear as labels.

use axum::{extract::Request, middleware::Next, response::Response};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::{Duration, Instant};

/// Initialize the Prometheus recorder and return the handle for the
/// `/metrics` endpoint. Must be called once, before any metrics are
/// recorded.
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("ward_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion.
///
/// Metric: `ward_http_requests_total`, `ward_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status` / `status_code`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("ward_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.clone(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("ward_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Record the outcome of a state-machine operation.
///
/// Metric: `ward_transitions_total`
/// Labels: `operation`, `outcome` (committed / rejected)
pub fn record_transition(operation: &'static str, committed: bool) {
    counter!("ward_transitions_total",
        "operation" => operation,
        "outcome" => if committed { "committed" } else { "rejected" }
    )
    .increment(1);
}

/// Middleware that records HTTP request metrics for all responses,
/// including framework-level errors produced before handlers run.
/// Applied as the outermost layer.
pub async fn http_metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    let duration = start.elapsed();
    record_http_request(&method, &path, response.status().as_u16(), duration);

    response
}

/// Categorize HTTP status code into success/error/timeout.
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize endpoint paths to prevent label cardinality explosion:
/// appointment ids and doctor names become placeholders.
fn normalize_endpoint(path: &str) -> String {
    match path {
        "/v1/health" | "/metrics" | "/v1/events" | "/v1/appointments" | "/v1/billing/revenue" => {
            path.to_string()
        }
        _ => normalize_dynamic_endpoint(path),
    }
}

fn normalize_dynamic_endpoint(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').collect();

    // /v1/appointments/{id}[/action]
    if path.starts_with("/v1/appointments/") {
        return match parts.as_slice() {
            [_, v1, appointments, _id] => format!("/{v1}/{appointments}/:id"),
            [_, v1, appointments, _id, action] => format!("/{v1}/{appointments}/:id/{action}"),
            _ => "/v1/appointments/unknown".to_string(),
        };
    }

    // /v1/queue/{doctor}[/call-next]
    if path.starts_with("/v1/queue/") {
        return match parts.as_slice() {
            [_, v1, queue, _doctor] => format!("/{v1}/{queue}/:doctor"),
            [_, v1, queue, _doctor, action] => format!("/{v1}/{queue}/:doctor/{action}"),
            _ => "/v1/queue/unknown".to_string(),
        };
    }

    // /v1/calls/* carries no dynamic segments
    if path.starts_with("/v1/calls/") {
        return path.to_string();
    }

    "unknown".to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_status_code() {
        assert_eq!(categorize_status_code(200), "success");
        assert_eq!(categorize_status_code(201), "success");
        assert_eq!(categorize_status_code(400), "error");
        assert_eq!(categorize_status_code(408), "timeout");
        assert_eq!(categorize_status_code(500), "error");
    }

    #[test]
    fn test_normalize_static_paths() {
        assert_eq!(normalize_endpoint("/v1/health"), "/v1/health");
        assert_eq!(normalize_endpoint("/metrics"), "/metrics");
        assert_eq!(normalize_endpoint("/v1/appointments"), "/v1/appointments");
    }

    #[test]
    fn test_normalize_appointment_paths() {
        let id = "b3c5a7e0-1d2f-4c6a-9b8d-0e1f2a3b4c5d";
        assert_eq!(
            normalize_endpoint(&format!("/v1/appointments/{id}")),
            "/v1/appointments/:id"
        );
        assert_eq!(
            normalize_endpoint(&format!("/v1/appointments/{id}/confirm")),
            "/v1/appointments/:id/confirm"
        );
    }

    #[test]
    fn test_normalize_queue_paths_hide_doctor_names() {
        assert_eq!(normalize_endpoint("/v1/queue/Dr.%20Lee"), "/v1/queue/:doctor");
        assert_eq!(
            normalize_endpoint("/v1/queue/Dr.%20Lee/call-next"),
            "/v1/queue/:doctor/call-next"
        );
    }

    #[test]
    fn test_normalize_unknown_path() {
        assert_eq!(normalize_endpoint("/totally/unknown"), "unknown");
    }
}

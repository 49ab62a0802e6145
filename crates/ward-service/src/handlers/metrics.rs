//! Prometheus metrics endpoint handler.
//!
//! Unauthenticated so Prometheus can scrape. Only operational data
//! with bounded cardinality labels is exposed, never patient data.

use axum::{extract::State, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;

/// Handler for GET /metrics
///
/// Returns Prometheus-formatted metrics for scraping. Operational
/// endpoint, not versioned under /v1.
#[tracing::instrument(skip_all, name = "ward.metrics.scrape")]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}

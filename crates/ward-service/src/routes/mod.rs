//! HTTP routes for the ward service.
//!
//! Defines the Axum router and application state.

use crate::auth::require_identity;
use crate::config::Config;
use crate::handlers;
use crate::observability::metrics::http_metrics_middleware;
use crate::repositories::RecordStore;
use crate::services::{AppointmentService, QueueService, SignalingService};
use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use event_fabric::RelayHandle;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Appointment and billing storage.
    pub store: Arc<dyn RecordStore>,

    /// Room-addressed relay handle.
    pub relay: RelayHandle,

    /// Appointment lifecycle service.
    pub appointments: AppointmentService,

    /// Consultation queue service.
    pub queue: QueueService,

    /// Call-setup signaling service.
    pub signaling: SignalingService,
}

/// Build the application routes.
///
/// - `/v1/health` and `/metrics` are public operational endpoints
/// - everything else requires a resolved actor identity
/// - TraceLayer for request logging, 30 second timeout, HTTP metrics
///   as the outermost layer
pub fn build_routes(state: Arc<AppState>, metrics_handle: Option<PrometheusHandle>) -> Router {
    let public_routes = Router::new()
        .route("/v1/health", get(handlers::health_check))
        .with_state(state.clone());

    let metrics_routes = match metrics_handle {
        Some(handle) => Router::new()
            .route("/metrics", get(handlers::metrics_handler))
            .with_state(handle),
        None => Router::new(),
    };

    let protected_routes = Router::new()
        // Appointment workflow
        .route("/v1/appointments", post(handlers::appointments::create_appointment))
        .route("/v1/appointments/:id", get(handlers::appointments::get_appointment))
        .route(
            "/v1/appointments/:id/confirm-request",
            post(handlers::appointments::admin_request_confirmation),
        )
        .route(
            "/v1/appointments/:id/confirm",
            post(handlers::appointments::doctor_confirm),
        )
        .route(
            "/v1/appointments/:id/payment",
            post(handlers::appointments::record_payment),
        )
        .route(
            "/v1/appointments/:id/schedule",
            post(handlers::appointments::schedule),
        )
        .route(
            "/v1/appointments/:id/cancel",
            post(handlers::appointments::cancel),
        )
        .route(
            "/v1/appointments/:id/status",
            patch(handlers::appointments::update_status),
        )
        .route(
            "/v1/appointments/:id/billing-status",
            patch(handlers::appointments::update_billing_status),
        )
        .route(
            "/v1/appointments/:id/billing",
            get(handlers::appointments::billing_records),
        )
        .route(
            "/v1/billing/revenue",
            get(handlers::appointments::revenue_report),
        )
        // Consultation queue
        .route("/v1/queue/:doctor/call-next", post(handlers::queue::call_next))
        .route("/v1/queue/:doctor", get(handlers::queue::queue_view))
        // Call signaling
        .route("/v1/calls/offer", post(handlers::calls::offer))
        .route("/v1/calls/answer", post(handlers::calls::answer))
        .route("/v1/calls/candidate", post(handlers::calls::candidate))
        .route("/v1/calls/end", post(handlers::calls::end))
        // Live event stream
        .route("/v1/events", get(handlers::events::events))
        .route_layer(middleware::from_fn(require_identity))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - timeout the request (innermost)
    // 2. TraceLayer - log request details
    // 3. http_metrics_middleware - record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_is_clone() {
        // Required for Axum's State extractor.
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[test]
    fn test_config_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<Config>();
    }
}

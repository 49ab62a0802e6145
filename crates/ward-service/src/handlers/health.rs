//! Health check handler.

use crate::errors::WardError;
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub ward_id: String,
    pub relay: String,
}

/// Health check handler.
///
/// Reports the relay actor's liveness along with the instance id. The
/// response is always 200 so orchestration probes can read the body;
/// an unhealthy relay shows up in `status`.
#[instrument(skip_all, name = "ward.health.check")]
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HealthResponse>, WardError> {
    let relay_healthy = !state.relay.is_cancelled();

    let response = HealthResponse {
        status: if relay_healthy { "healthy" } else { "unhealthy" }.to_string(),
        ward_id: state.config.ward_id.clone(),
        relay: if relay_healthy { "healthy" } else { "stopped" }.to_string(),
    };

    Ok(Json(response))
}

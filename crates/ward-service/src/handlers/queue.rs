//! Consultation queue handlers.
//!
//! - `POST /v1/queue/:doctor/call-next` - advance the doctor's queue
//! - `GET /v1/queue/:doctor` - today's queue snapshot

use crate::errors::WardError;
use crate::handlers::appointments::require_role;
use crate::models::QueueView;
use crate::repositories::CallNextOutcome;
use crate::routes::AppState;
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use common::types::{ActorIdentity, ActorRole, AppointmentId};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

#[derive(Debug, Serialize)]
pub struct CallNextResponse {
    /// Token now in consultation, absent when the queue drained.
    pub active_token: Option<i32>,
    pub active_appointment_id: Option<AppointmentId>,
    /// Entry completed by this call, if one was in consultation.
    pub completed_appointment_id: Option<AppointmentId>,
    pub queue_empty: bool,
}

/// Handler for POST /v1/queue/:doctor/call-next
#[instrument(skip_all, name = "ward.handlers.call_next", fields(doctor = %doctor))]
pub async fn call_next(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<ActorIdentity>,
    Path(doctor): Path<String>,
) -> Result<Json<CallNextResponse>, WardError> {
    require_role(&identity, &[ActorRole::Doctor, ActorRole::Admin])?;

    let response = match state.queue.call_next(&doctor).await? {
        CallNextOutcome::Activated {
            appointment,
            completed_previous,
        } => CallNextResponse {
            active_token: appointment.token_number,
            active_appointment_id: Some(appointment.id),
            completed_appointment_id: completed_previous,
            queue_empty: false,
        },
        CallNextOutcome::QueueEmpty { completed_previous } => CallNextResponse {
            active_token: None,
            active_appointment_id: None,
            completed_appointment_id: completed_previous,
            queue_empty: true,
        },
    };

    Ok(Json(response))
}

/// Handler for GET /v1/queue/:doctor
#[instrument(skip_all, name = "ward.handlers.queue_view", fields(doctor = %doctor))]
pub async fn queue_view(
    State(state): State<Arc<AppState>>,
    Path(doctor): Path<String>,
) -> Result<Json<QueueView>, WardError> {
    let view = state.queue.queue_view(&doctor).await?;
    Ok(Json(view))
}

//! Appointment workflow handlers.
//!
//! One endpoint per state-machine operation:
//!
//! - `POST /v1/appointments` - create a request (patient)
//! - `GET /v1/appointments/:id` - fetch one appointment
//! - `POST /v1/appointments/:id/confirm-request` - admin forwards to doctor
//! - `POST /v1/appointments/:id/confirm` - doctor confirms with fee
//! - `POST /v1/appointments/:id/payment` - record verified payment
//! - `POST /v1/appointments/:id/schedule` - admin override schedule
//! - `POST /v1/appointments/:id/cancel` - cancel with reason
//! - `PATCH /v1/appointments/:id/status` - day-of-visit status update
//! - `PATCH /v1/appointments/:id/billing-status` - billing axis update
//! - `GET /v1/appointments/:id/billing` - billing records
//! - `GET /v1/billing/revenue` - collected payments per doctor

use crate::errors::WardError;
use crate::models::{Appointment, BillingRecord, DoctorRevenue};
use crate::routes::AppState;
use crate::services::appointments::{CreateRequest, PaymentAttestation};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use common::types::{ActorIdentity, ActorRole, AppointmentId, PatientId};
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

// ============================================================================
// Request Models
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Option<Uuid>,
    pub patient_name: Option<String>,
    pub patient_phone: Option<String>,
    pub doctor_name: Option<String>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DoctorConfirmRequest {
    pub consultation_fee: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RecordPaymentRequest {
    pub order_id: Option<String>,
    pub payment_id: Option<String>,
    pub signature: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleRequest {
    pub scheduled_time: Option<DateTime<Utc>>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBillingStatusRequest {
    pub billing_status: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Handler for POST /v1/appointments
#[instrument(skip_all, name = "ward.handlers.create_appointment")]
pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<ActorIdentity>,
    Json(body): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Appointment>), WardError> {
    // A patient creating their own request is implicitly the subject.
    let patient_id = body
        .patient_id
        .or(match identity.role {
            ActorRole::Patient => identity.actor_id,
            _ => None,
        })
        .map(PatientId);

    let appointment = state
        .appointments
        .create(CreateRequest {
            patient_id,
            requested_by: identity.actor_id.map(|id| id.to_string()),
            patient_name: body.patient_name,
            patient_phone: body.patient_phone,
            doctor_name: body.doctor_name,
            scheduled_time: body.scheduled_time,
            reason: body.reason,
            note: body.note,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(appointment)))
}

/// Handler for GET /v1/appointments/:id
#[instrument(skip_all, name = "ward.handlers.get_appointment", fields(appointment_id = %id))]
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Appointment>, WardError> {
    let appointment = state.appointments.get(AppointmentId(id)).await?;
    Ok(Json(appointment))
}

/// Handler for POST /v1/appointments/:id/confirm-request
#[instrument(skip_all, name = "ward.handlers.confirm_request", fields(appointment_id = %id))]
pub async fn admin_request_confirmation(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<ActorIdentity>,
    Path(id): Path<Uuid>,
) -> Result<Json<Appointment>, WardError> {
    require_role(&identity, &[ActorRole::Admin])?;
    let appointment = state
        .appointments
        .admin_request_confirmation(AppointmentId(id))
        .await?;
    Ok(Json(appointment))
}

/// Handler for POST /v1/appointments/:id/confirm
#[instrument(skip_all, name = "ward.handlers.doctor_confirm", fields(appointment_id = %id))]
pub async fn doctor_confirm(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<ActorIdentity>,
    Path(id): Path<Uuid>,
    Json(body): Json<DoctorConfirmRequest>,
) -> Result<Json<Appointment>, WardError> {
    require_role(&identity, &[ActorRole::Doctor, ActorRole::Admin])?;
    let appointment = state
        .appointments
        .doctor_confirm(AppointmentId(id), body.consultation_fee)
        .await?;
    Ok(Json(appointment))
}

/// Handler for POST /v1/appointments/:id/payment
#[instrument(skip_all, name = "ward.handlers.record_payment", fields(appointment_id = %id))]
pub async fn record_payment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<RecordPaymentRequest>,
) -> Result<Json<Appointment>, WardError> {
    let attestation = PaymentAttestation {
        order_id: required(body.order_id, "order_id")?,
        payment_id: required(body.payment_id, "payment_id")?,
        signature: required(body.signature, "signature")?,
    };
    let appointment = state
        .appointments
        .record_payment(AppointmentId(id), attestation)
        .await?;
    Ok(Json(appointment))
}

/// Handler for POST /v1/appointments/:id/schedule
#[instrument(skip_all, name = "ward.handlers.schedule", fields(appointment_id = %id))]
pub async fn schedule(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<ActorIdentity>,
    Path(id): Path<Uuid>,
    Json(body): Json<ScheduleRequest>,
) -> Result<Json<Appointment>, WardError> {
    require_role(&identity, &[ActorRole::Admin])?;
    let appointment = state
        .appointments
        .schedule(AppointmentId(id), body.scheduled_time, body.note)
        .await?;
    Ok(Json(appointment))
}

/// Handler for POST /v1/appointments/:id/cancel
#[instrument(skip_all, name = "ward.handlers.cancel", fields(appointment_id = %id))]
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<ActorIdentity>,
    Path(id): Path<Uuid>,
    Json(body): Json<CancelRequest>,
) -> Result<Json<Appointment>, WardError> {
    require_role(&identity, &[ActorRole::Admin, ActorRole::Patient])?;
    let appointment = state
        .appointments
        .cancel(AppointmentId(id), body.reason)
        .await?;
    Ok(Json(appointment))
}

/// Handler for PATCH /v1/appointments/:id/status
#[instrument(skip_all, name = "ward.handlers.update_status", fields(appointment_id = %id))]
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<ActorIdentity>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<Appointment>, WardError> {
    require_role(&identity, &[ActorRole::Admin, ActorRole::Doctor])?;
    let status = required(body.status, "status")?;
    let appointment = state
        .appointments
        .update_status(AppointmentId(id), &status)
        .await?;
    Ok(Json(appointment))
}

/// Handler for PATCH /v1/appointments/:id/billing-status
#[instrument(skip_all, name = "ward.handlers.update_billing_status", fields(appointment_id = %id))]
pub async fn update_billing_status(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<ActorIdentity>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateBillingStatusRequest>,
) -> Result<Json<Appointment>, WardError> {
    require_role(&identity, &[ActorRole::Admin])?;
    let status = required(body.billing_status, "billing_status")?;
    let appointment = state
        .appointments
        .update_billing_status(AppointmentId(id), &status)
        .await?;
    Ok(Json(appointment))
}

/// Handler for GET /v1/appointments/:id/billing
#[instrument(skip_all, name = "ward.handlers.billing_records", fields(appointment_id = %id))]
pub async fn billing_records(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<ActorIdentity>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<BillingRecord>>, WardError> {
    require_role(&identity, &[ActorRole::Admin])?;
    let records = state.appointments.billing_records(AppointmentId(id)).await?;
    Ok(Json(records))
}

/// Handler for GET /v1/billing/revenue
#[instrument(skip_all, name = "ward.handlers.revenue_report")]
pub async fn revenue_report(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<ActorIdentity>,
) -> Result<Json<Vec<DoctorRevenue>>, WardError> {
    require_role(&identity, &[ActorRole::Admin])?;
    let revenue = state.appointments.revenue_by_doctor().await?;
    Ok(Json(revenue))
}

// ============================================================================
// Helpers
// ============================================================================

pub(crate) fn require_role(
    identity: &ActorIdentity,
    allowed: &[ActorRole],
) -> Result<(), WardError> {
    if allowed.contains(&identity.role) {
        Ok(())
    } else {
        Err(WardError::Forbidden(format!(
            "Role '{}' may not perform this operation",
            identity.role.as_str()
        )))
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, WardError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| WardError::Validation(format!("{field} is required")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_require_role() {
        let admin = ActorIdentity::admin();
        assert!(require_role(&admin, &[ActorRole::Admin]).is_ok());
        assert!(matches!(
            require_role(&admin, &[ActorRole::Doctor]),
            Err(WardError::Forbidden(_))
        ));
    }

    #[test]
    fn test_required_rejects_blank() {
        assert!(required(Some("ok".to_string()), "f").is_ok());
        assert!(required(Some("  ".to_string()), "f").is_err());
        assert!(required(None, "f").is_err());
    }
}

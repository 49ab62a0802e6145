//! Appointment lifecycle service.
//!
//! Owns the state machine of the appointment aggregate. Every guarded
//! transition goes through the store's conditional update, so the
//! status check and the mutation are one atomic operation; two
//! concurrent confirmations of the same appointment resolve to one
//! winner and one `IllegalTransition`.
//!
//! Side effects (room fan-out, SMS fallback) run only after the store
//! has committed the transition.

use crate::errors::WardError;
use crate::models::{Appointment, AppointmentStatus, BillingRecord, BillingStatus, DoctorRevenue};
use crate::observability::metrics::record_transition;
use crate::repositories::{AppointmentChange, NewAppointment, RecordStore, TransitionOutcome};
use crate::services::notifications::{Dispatcher, Transition};
use crate::services::payments::PaymentVerifier;
use chrono::{DateTime, Utc};
use common::types::{AppointmentId, PatientId};
use std::sync::Arc;
use tracing::instrument;

/// Raw create input, validated by the service before insertion.
#[derive(Debug, Clone, Default)]
pub struct CreateRequest {
    pub patient_id: Option<PatientId>,
    pub requested_by: Option<String>,
    pub patient_name: Option<String>,
    pub patient_phone: Option<String>,
    pub doctor_name: Option<String>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    pub note: Option<String>,
}

/// Payment attestation relayed by the client from the gateway.
#[derive(Debug, Clone)]
pub struct PaymentAttestation {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

#[derive(Clone)]
pub struct AppointmentService {
    store: Arc<dyn RecordStore>,
    dispatcher: Dispatcher,
    verifier: Arc<dyn PaymentVerifier>,
}

impl AppointmentService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        dispatcher: Dispatcher,
        verifier: Arc<dyn PaymentVerifier>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            verifier,
        }
    }

    /// Create a new appointment in `pending_admin` and notify admins.
    #[instrument(skip_all)]
    pub async fn create(&self, request: CreateRequest) -> Result<Appointment, WardError> {
        let doctor_name = required_text(request.doctor_name, "doctor_name")?;
        let reason = required_text(request.reason, "reason")?;
        let scheduled_time = request
            .scheduled_time
            .ok_or_else(|| WardError::Validation("scheduled_time is required".to_string()))?;
        let patient_name = request
            .patient_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "Patient".to_string());

        let appointment = self
            .store
            .insert_appointment(NewAppointment {
                patient_id: request.patient_id,
                requested_by: request.requested_by,
                patient_name,
                patient_phone: request.patient_phone,
                doctor_name,
                scheduled_time,
                reason,
                note: request.note,
            })
            .await?;

        tracing::info!(
            target: "ward.service.appointments",
            appointment_id = %appointment.id,
            doctor = %appointment.doctor_name,
            "Appointment request created"
        );

        self.dispatcher
            .dispatch(Transition::Created, &appointment)
            .await;
        Ok(appointment)
    }

    /// Admin forwards a new request to the doctor for confirmation.
    #[instrument(skip_all, fields(appointment_id = %id))]
    pub async fn admin_request_confirmation(
        &self,
        id: AppointmentId,
    ) -> Result<Appointment, WardError> {
        let appointment = self
            .transition(
                "admin_request_confirmation",
                id,
                AppointmentStatus::PendingDoctor,
                AppointmentChange::default(),
            )
            .await?;

        self.dispatcher
            .dispatch(Transition::ConfirmationRequested, &appointment)
            .await;
        Ok(appointment)
    }

    /// Doctor confirms and sets the consultation fee; the patient is
    /// asked to pay.
    #[instrument(skip_all, fields(appointment_id = %id))]
    pub async fn doctor_confirm(
        &self,
        id: AppointmentId,
        consultation_fee: Option<i64>,
    ) -> Result<Appointment, WardError> {
        let fee = consultation_fee
            .ok_or_else(|| WardError::Validation("consultation_fee is required".to_string()))?;
        if fee <= 0 {
            return Err(WardError::Validation(
                "consultation_fee must be positive".to_string(),
            ));
        }

        let appointment = self
            .transition(
                "doctor_confirm",
                id,
                AppointmentStatus::PendingPayment,
                AppointmentChange {
                    consultation_fee: Some(fee),
                    ..AppointmentChange::default()
                },
            )
            .await?;

        self.dispatcher
            .dispatch(Transition::DoctorConfirmed, &appointment)
            .await;
        Ok(appointment)
    }

    /// Record a gateway payment. Verification failure is fail-closed:
    /// nothing is written and no billing record is created.
    #[instrument(skip_all, fields(appointment_id = %id))]
    pub async fn record_payment(
        &self,
        id: AppointmentId,
        attestation: PaymentAttestation,
    ) -> Result<Appointment, WardError> {
        if !self.verifier.verify(
            &attestation.order_id,
            &attestation.payment_id,
            &attestation.signature,
        ) {
            return Err(WardError::VerificationFailed);
        }

        let outcome = self
            .store
            .record_payment(id, &attestation.payment_id)
            .await?;
        let result = resolve(outcome, AppointmentStatus::Scheduled);
        record_transition("record_payment", result.is_ok());
        let appointment = result?;

        tracing::info!(
            target: "ward.service.appointments",
            appointment_id = %appointment.id,
            token = ?appointment.token_number,
            "Payment recorded, appointment scheduled"
        );

        self.dispatcher
            .dispatch(Transition::PaymentRecorded, &appointment)
            .await;
        Ok(appointment)
    }

    /// Admin override: force any live appointment into `scheduled`,
    /// optionally moving its time. Allocates a queue token if the
    /// appointment does not hold one yet.
    #[instrument(skip_all, fields(appointment_id = %id))]
    pub async fn schedule(
        &self,
        id: AppointmentId,
        new_time: Option<DateTime<Utc>>,
        note: Option<String>,
    ) -> Result<Appointment, WardError> {
        let appointment = self
            .transition(
                "schedule",
                id,
                AppointmentStatus::Scheduled,
                AppointmentChange {
                    scheduled_time: new_time,
                    note,
                    assign_queue_token: true,
                    ..AppointmentChange::default()
                },
            )
            .await?;

        self.dispatcher
            .dispatch(Transition::Rescheduled, &appointment)
            .await;
        Ok(appointment)
    }

    /// Cancel any live appointment, recording the reason.
    #[instrument(skip_all, fields(appointment_id = %id))]
    pub async fn cancel(
        &self,
        id: AppointmentId,
        reason: Option<String>,
    ) -> Result<Appointment, WardError> {
        let reason = required_text(reason, "reason")?;

        let appointment = self
            .transition(
                "cancel",
                id,
                AppointmentStatus::Cancelled,
                AppointmentChange {
                    cancellation_reason: Some(reason),
                    ..AppointmentChange::default()
                },
            )
            .await?;

        self.dispatcher
            .dispatch(Transition::Cancelled, &appointment)
            .await;
        Ok(appointment)
    }

    /// Day-of-visit status update, restricted to the operational subset.
    #[instrument(skip_all, fields(appointment_id = %id, status = %status))]
    pub async fn update_status(
        &self,
        id: AppointmentId,
        status: &str,
    ) -> Result<Appointment, WardError> {
        let target = parse_operational_status(status).ok_or_else(|| {
            WardError::Validation(format!("'{status}' is not an operational status"))
        })?;

        let appointment = self
            .transition(
                "update_status",
                id,
                target,
                AppointmentChange {
                    assign_queue_token: target == AppointmentStatus::Scheduled,
                    ..AppointmentChange::default()
                },
            )
            .await?;

        self.dispatcher
            .dispatch(Transition::StatusUpdated, &appointment)
            .await;
        Ok(appointment)
    }

    /// Move the billing paperwork axis. Independent of `status`.
    #[instrument(skip_all, fields(appointment_id = %id, billing_status = %status))]
    pub async fn update_billing_status(
        &self,
        id: AppointmentId,
        status: &str,
    ) -> Result<Appointment, WardError> {
        let billing = BillingStatus::parse(status).ok_or_else(|| {
            WardError::Validation(format!("'{status}' is not a billing status"))
        })?;

        let appointment = self
            .store
            .update_billing_status(id, billing)
            .await?
            .ok_or_else(|| WardError::NotFound("Appointment not found".to_string()))?;

        self.dispatcher
            .dispatch(Transition::BillingUpdated, &appointment)
            .await;
        Ok(appointment)
    }

    #[instrument(skip_all, fields(appointment_id = %id))]
    pub async fn get(&self, id: AppointmentId) -> Result<Appointment, WardError> {
        self.store
            .get_appointment(id)
            .await?
            .ok_or_else(|| WardError::NotFound("Appointment not found".to_string()))
    }

    #[instrument(skip_all, fields(appointment_id = %id))]
    pub async fn billing_records(
        &self,
        id: AppointmentId,
    ) -> Result<Vec<BillingRecord>, WardError> {
        self.store.billing_records(id).await
    }

    /// Collected payment totals per doctor.
    #[instrument(skip_all)]
    pub async fn revenue_by_doctor(&self) -> Result<Vec<DoctorRevenue>, WardError> {
        self.store.revenue_by_doctor().await
    }

    /// Run one guarded transition; the allowed source set is derived
    /// from the transition table.
    async fn transition(
        &self,
        operation: &'static str,
        id: AppointmentId,
        to: AppointmentStatus,
        change: AppointmentChange,
    ) -> Result<Appointment, WardError> {
        let allowed = AppointmentStatus::sources_for(to);
        let outcome = self.store.update_if_status(id, &allowed, to, change).await?;
        let result = resolve(outcome, to);
        record_transition(operation, result.is_ok());
        result
    }
}

fn resolve(outcome: TransitionOutcome, to: AppointmentStatus) -> Result<Appointment, WardError> {
    match outcome {
        TransitionOutcome::Updated(appointment) => Ok(appointment),
        TransitionOutcome::NotFound => {
            Err(WardError::NotFound("Appointment not found".to_string()))
        }
        TransitionOutcome::StatusMismatch { current } => Err(WardError::IllegalTransition {
            from: current.as_str().to_string(),
            to: to.as_str().to_string(),
        }),
    }
}

fn required_text(value: Option<String>, field: &str) -> Result<String, WardError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| WardError::Validation(format!("{field} is required")))
}

/// The day-of-visit workflow may only move the primary status through
/// this subset; anything else is rejected before touching the store.
/// `pending` is part of the vocabulary but no state transitions back
/// into it, so requesting it always surfaces the current state as an
/// illegal transition rather than a validation error.
fn parse_operational_status(s: &str) -> Option<AppointmentStatus> {
    match s {
        "pending" => Some(AppointmentStatus::PendingAdmin),
        "scheduled" => Some(AppointmentStatus::Scheduled),
        "ongoing" => Some(AppointmentStatus::Ongoing),
        "completed" => Some(AppointmentStatus::Completed),
        "cancelled" => Some(AppointmentStatus::Cancelled),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_operational_subset() {
        assert_eq!(
            parse_operational_status("pending"),
            Some(AppointmentStatus::PendingAdmin)
        );
        assert_eq!(
            parse_operational_status("ongoing"),
            Some(AppointmentStatus::Ongoing)
        );
        // Internal states are not part of the operational vocabulary.
        assert_eq!(parse_operational_status("pending_doctor"), None);
        assert_eq!(parse_operational_status("pending_payment"), None);
        assert_eq!(parse_operational_status("archived"), None);
    }

    #[test]
    fn test_required_text_trims_and_rejects_empty() {
        assert_eq!(
            required_text(Some("  checkup ".to_string()), "reason").unwrap(),
            "checkup"
        );
        assert!(required_text(Some("   ".to_string()), "reason").is_err());
        assert!(required_text(None, "reason").is_err());
    }
}

//! Record store interface.
//!
//! The store is the serialization point for appointment transitions:
//! every guarded mutation is a single conditional update (guard and
//! write in one atomic operation, never read-modify-write across two
//! round trips). Services depend on the [`RecordStore`] trait; the
//! production implementation is Postgres, tests swap in an in-memory
//! store.

use crate::errors::WardError;
use crate::models::{
    Appointment, AppointmentStatus, BillingRecord, BillingStatus, DoctorRevenue, PaymentStatus,
    QueueView,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::types::{AppointmentId, PatientId};

pub mod appointments;

pub use appointments::PgRecordStore;

/// Input for creating a new appointment in `pending_admin`.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: Option<PatientId>,
    pub requested_by: Option<String>,
    pub patient_name: String,
    pub patient_phone: Option<String>,
    pub doctor_name: String,
    pub scheduled_time: DateTime<Utc>,
    pub reason: String,
    pub note: Option<String>,
}

/// Field changes applied together with a status transition.
///
/// The transition and the field writes land in one conditional update;
/// none of it applies if the status guard fails.
#[derive(Debug, Clone, Default)]
pub struct AppointmentChange {
    pub consultation_fee: Option<i64>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub note: Option<String>,
    pub cancellation_reason: Option<String>,
    pub payment_status: Option<PaymentStatus>,
    /// Allocate a per-doctor, per-day queue token if the appointment
    /// does not already hold one.
    pub assign_queue_token: bool,
}

/// Result of a guarded status transition.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    /// The guard matched; the returned aggregate reflects the update.
    Updated(Appointment),
    /// No appointment with that id exists.
    NotFound,
    /// The appointment exists but its current status is not an allowed
    /// source for this transition.
    StatusMismatch { current: AppointmentStatus },
}

/// Result of a call-next operation on a doctor's queue.
#[derive(Debug, Clone)]
pub enum CallNextOutcome {
    /// The lowest waiting token is now in consultation.
    Activated {
        appointment: Appointment,
        /// The entry that was in consultation before, now completed.
        completed_previous: Option<AppointmentId>,
    },
    /// No waiting entries. Any in-consultation entry has still been
    /// completed; the queue may legitimately drain.
    QueueEmpty {
        completed_previous: Option<AppointmentId>,
    },
}

/// Durable storage for appointment and billing aggregates.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new appointment in `pending_admin`.
    async fn insert_appointment(&self, new: NewAppointment) -> Result<Appointment, WardError>;

    /// Fetch one appointment by id.
    async fn get_appointment(
        &self,
        id: AppointmentId,
    ) -> Result<Option<Appointment>, WardError>;

    /// Transition `id` to `to` if its current status is in
    /// `allowed_from`, applying `change` in the same atomic operation.
    async fn update_if_status(
        &self,
        id: AppointmentId,
        allowed_from: &[AppointmentStatus],
        to: AppointmentStatus,
        change: AppointmentChange,
    ) -> Result<TransitionOutcome, WardError>;

    /// Record a verified payment: `pending_payment -> scheduled`,
    /// `payment_status = paid`, queue token allocation and exactly one
    /// billing record, all in one atomic operation. Nothing is written
    /// when the status guard fails.
    async fn record_payment(
        &self,
        id: AppointmentId,
        payment_ref: &str,
    ) -> Result<TransitionOutcome, WardError>;

    /// Set the billing paperwork status. Independent of the primary
    /// lifecycle axis.
    async fn update_billing_status(
        &self,
        id: AppointmentId,
        billing_status: BillingStatus,
    ) -> Result<Option<Appointment>, WardError>;

    /// Complete the current in-consultation entry (if any) and activate
    /// the lowest-token waiting entry for this doctor within the given
    /// day window, as one serialized operation per doctor.
    async fn call_next(
        &self,
        doctor_name: &str,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> Result<CallNextOutcome, WardError>;

    /// Snapshot of a doctor's queue for the given day window. Observes
    /// committed state only.
    async fn queue_view(
        &self,
        doctor_name: &str,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> Result<QueueView, WardError>;

    /// Billing records for one appointment, oldest first.
    async fn billing_records(
        &self,
        id: AppointmentId,
    ) -> Result<Vec<BillingRecord>, WardError>;

    /// Collected payment totals grouped by doctor, highest first.
    async fn revenue_by_doctor(&self) -> Result<Vec<DoctorRevenue>, WardError>;
}

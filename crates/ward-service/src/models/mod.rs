//! Appointment aggregate and its status axes.
//!
//! The appointment carries three independent status fields:
//!
//! - `status` - the primary lifecycle (state machine in this module)
//! - `payment_status` - payment outcome, set once on verified payment
//! - `billing_status` - billing paperwork progress, moved by admins
//!
//! The queue axis (`queue_status` + `token_number`) is a second state
//! machine scoped to the doctor's current day; it is coupled to the
//! primary lifecycle only at the documented points (activation sets
//! `status = ongoing`, completion sets `status = completed`).

use chrono::{DateTime, Utc};
use common::types::{AppointmentId, PatientId};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Primary lifecycle
// ============================================================================

/// Primary appointment lifecycle status.
///
/// Legal transitions:
///
/// ```text
/// pending_admin -> pending_doctor -> pending_payment -> scheduled
///                                                           |
///                                              ongoing <----+
///                                                 |
///                                             completed
/// ```
///
/// `cancelled` is reachable from any non-terminal state, as is
/// `scheduled` (admin override). `completed` and `cancelled` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    PendingAdmin,
    PendingDoctor,
    PendingPayment,
    Scheduled,
    Ongoing,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::PendingAdmin => "pending_admin",
            AppointmentStatus::PendingDoctor => "pending_doctor",
            AppointmentStatus::PendingPayment => "pending_payment",
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Ongoing => "ongoing",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending_admin" => Some(AppointmentStatus::PendingAdmin),
            "pending_doctor" => Some(AppointmentStatus::PendingDoctor),
            "pending_payment" => Some(AppointmentStatus::PendingPayment),
            "scheduled" => Some(AppointmentStatus::Scheduled),
            "ongoing" => Some(AppointmentStatus::Ongoing),
            "completed" => Some(AppointmentStatus::Completed),
            "cancelled" => Some(AppointmentStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether this state admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled
        )
    }

    /// Whether a transition from `self` to `to` is legal.
    pub fn can_transition_to(&self, to: AppointmentStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match to {
            // Admin override and cancellation apply from any live state.
            AppointmentStatus::Scheduled | AppointmentStatus::Cancelled => true,
            AppointmentStatus::PendingDoctor => *self == AppointmentStatus::PendingAdmin,
            AppointmentStatus::PendingPayment => *self == AppointmentStatus::PendingDoctor,
            AppointmentStatus::Ongoing => *self == AppointmentStatus::Scheduled,
            AppointmentStatus::Completed => *self == AppointmentStatus::Ongoing,
            // No inbound edges to the initial state.
            AppointmentStatus::PendingAdmin => false,
        }
    }

    /// Source states from which a transition to `to` is legal.
    ///
    /// Used by the store's conditional update so the guard and the
    /// mutation happen in one statement.
    pub fn sources_for(to: AppointmentStatus) -> Vec<AppointmentStatus> {
        ALL_STATUSES
            .iter()
            .copied()
            .filter(|from| from.can_transition_to(to))
            .collect()
    }
}

const ALL_STATUSES: [AppointmentStatus; 7] = [
    AppointmentStatus::PendingAdmin,
    AppointmentStatus::PendingDoctor,
    AppointmentStatus::PendingPayment,
    AppointmentStatus::Scheduled,
    AppointmentStatus::Ongoing,
    AppointmentStatus::Completed,
    AppointmentStatus::Cancelled,
];

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Secondary axes
// ============================================================================

/// Payment outcome axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "paid" => Some(PaymentStatus::Paid),
            "failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

/// Billing paperwork axis, independent of the primary lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingStatus {
    Unbilled,
    Requested,
    Generated,
}

impl BillingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingStatus::Unbilled => "unbilled",
            BillingStatus::Requested => "requested",
            BillingStatus::Generated => "generated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unbilled" => Some(BillingStatus::Unbilled),
            "requested" => Some(BillingStatus::Requested),
            "generated" => Some(BillingStatus::Generated),
            _ => None,
        }
    }
}

/// Per-day consultation queue axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Waiting,
    InConsultation,
    Completed,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Waiting => "waiting",
            QueueStatus::InConsultation => "in_consultation",
            QueueStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "waiting" => Some(QueueStatus::Waiting),
            "in_consultation" => Some(QueueStatus::InConsultation),
            "completed" => Some(QueueStatus::Completed),
            _ => None,
        }
    }
}

// ============================================================================
// Aggregates
// ============================================================================

/// The appointment aggregate.
///
/// This is the unit of mutual exclusion: concurrent transitions on the
/// same id are serialized by the store's conditional update.
#[derive(Debug, Clone, Serialize)]
pub struct Appointment {
    pub id: AppointmentId,
    /// Patient record reference, when the requester is a known patient.
    pub patient_id: Option<PatientId>,
    /// External identity of the requesting actor.
    pub requested_by: Option<String>,
    pub patient_name: String,
    /// Destination for the durable SMS fallback. Optional; absence
    /// downgrades Schedule/Cancel notifications to relay-only.
    pub patient_phone: Option<String>,
    /// Physician display name; also the doctor room addressing key.
    pub doctor_name: String,
    pub scheduled_time: DateTime<Utc>,
    pub reason: String,
    pub note: Option<String>,
    /// Consultation fee in minor currency units.
    pub consultation_fee: i64,
    pub status: AppointmentStatus,
    pub payment_status: PaymentStatus,
    pub billing_status: BillingStatus,
    pub cancellation_reason: Option<String>,
    /// Per-doctor, per-day queue position. Assigned on transition into
    /// `scheduled`, monotonically increasing.
    pub token_number: Option<i32>,
    pub queue_status: Option<QueueStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Billing record created exactly once per verified payment.
#[derive(Debug, Clone, Serialize)]
pub struct BillingRecord {
    pub id: uuid::Uuid,
    pub appointment_id: AppointmentId,
    /// Mirrors the consultation fee at payment time, minor units.
    pub amount: i64,
    pub payment_ref: String,
    pub created_at: DateTime<Utc>,
}

/// Snapshot of one doctor's consultation queue for the current day.
#[derive(Debug, Clone, Serialize)]
pub struct QueueView {
    pub doctor_name: String,
    /// At most one entry per doctor per day.
    pub in_consultation: Option<QueueEntry>,
    /// Ordered by ascending token number.
    pub waiting: Vec<QueueEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueEntry {
    pub appointment_id: AppointmentId,
    pub patient_name: String,
    pub token_number: i32,
}

/// Collected payments for one doctor, minor units.
#[derive(Debug, Clone, Serialize)]
pub struct DoctorRevenue {
    pub doctor_name: String,
    pub total_amount: i64,
    pub payment_count: i64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in ALL_STATUSES {
            assert_eq!(AppointmentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AppointmentStatus::parse("archived"), None);
    }

    #[test]
    fn test_forward_chain_is_legal() {
        use AppointmentStatus::*;
        assert!(PendingAdmin.can_transition_to(PendingDoctor));
        assert!(PendingDoctor.can_transition_to(PendingPayment));
        assert!(PendingPayment.can_transition_to(Scheduled));
        assert!(Scheduled.can_transition_to(Ongoing));
        assert!(Ongoing.can_transition_to(Completed));
    }

    #[test]
    fn test_no_skipped_edges() {
        use AppointmentStatus::*;
        assert!(!PendingAdmin.can_transition_to(PendingPayment));
        assert!(!PendingAdmin.can_transition_to(Ongoing));
        assert!(!PendingDoctor.can_transition_to(Ongoing));
        assert!(!Scheduled.can_transition_to(Completed));
        assert!(!PendingPayment.can_transition_to(Ongoing));
    }

    #[test]
    fn test_cancel_from_any_non_terminal() {
        use AppointmentStatus::*;
        for from in [PendingAdmin, PendingDoctor, PendingPayment, Scheduled, Ongoing] {
            assert!(from.can_transition_to(Cancelled), "{from} should cancel");
        }
    }

    #[test]
    fn test_terminal_states_admit_nothing() {
        use AppointmentStatus::*;
        for to in ALL_STATUSES {
            assert!(!Completed.can_transition_to(to));
            assert!(!Cancelled.can_transition_to(to));
        }
    }

    #[test]
    fn test_initial_state_unreachable() {
        use AppointmentStatus::*;
        for from in ALL_STATUSES {
            assert!(!from.can_transition_to(PendingAdmin));
        }
    }

    #[test]
    fn test_admin_override_schedule() {
        use AppointmentStatus::*;
        // Reschedule of an already scheduled appointment is legal.
        assert!(Scheduled.can_transition_to(Scheduled));
        assert!(Ongoing.can_transition_to(Scheduled));
        assert!(!Completed.can_transition_to(Scheduled));
    }

    #[test]
    fn test_sources_for_matches_table() {
        use AppointmentStatus::*;
        assert_eq!(sources_sorted(PendingDoctor), vec!["pending_admin"]);
        assert_eq!(sources_sorted(Ongoing), vec!["scheduled"]);
        assert_eq!(sources_sorted(Completed), vec!["ongoing"]);
        assert_eq!(
            sources_sorted(Cancelled),
            vec![
                "ongoing",
                "pending_admin",
                "pending_doctor",
                "pending_payment",
                "scheduled"
            ]
        );
        assert!(sources_sorted(PendingAdmin).is_empty());
    }

    fn sources_sorted(to: AppointmentStatus) -> Vec<&'static str> {
        let mut v: Vec<&'static str> = AppointmentStatus::sources_for(to)
            .into_iter()
            .map(|s| s.as_str())
            .collect();
        v.sort_unstable();
        v
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&AppointmentStatus::PendingPayment).unwrap();
        assert_eq!(json, "\"pending_payment\"");
        // Unknown variants fail to deserialize rather than coercing.
        assert!(serde_json::from_str::<AppointmentStatus>("\"archived\"").is_err());
    }
}

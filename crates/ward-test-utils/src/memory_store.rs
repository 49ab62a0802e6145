//! In-memory record store.
//!
//! Mirrors the conditional-update semantics of the Postgres store: the
//! status guard and the mutation happen under one lock acquisition, so
//! concurrent transitions on the same appointment serialize exactly as
//! they would against the database. Call-next locks the whole store,
//! which gives the same per-doctor serialization the production store
//! gets from its advisory lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::types::AppointmentId;
use event_fabric::room::canonicalize_doctor_name;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;
use ward_service::errors::WardError;
use ward_service::models::{
    Appointment, AppointmentStatus, BillingRecord, BillingStatus, DoctorRevenue, PaymentStatus,
    QueueEntry, QueueStatus, QueueView,
};
use ward_service::repositories::{
    AppointmentChange, CallNextOutcome, NewAppointment, RecordStore, TransitionOutcome,
};

#[derive(Default)]
struct Inner {
    appointments: HashMap<AppointmentId, Appointment>,
    billing: Vec<BillingRecord>,
}

/// In-memory implementation of [`RecordStore`].
#[derive(Default)]
pub struct MemoryRecordStore {
    inner: Mutex<Inner>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct snapshot of one appointment, bypassing the trait, for
    /// assertions.
    pub fn snapshot(&self, id: AppointmentId) -> Option<Appointment> {
        self.lock().appointments.get(&id).cloned()
    }

    /// Number of billing records across all appointments.
    pub fn billing_record_count(&self) -> usize {
        self.lock().billing.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("memory store lock poisoned")
    }
}

/// UTC day window containing `t`.
fn day_of(t: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = t.date_naive().and_time(chrono::NaiveTime::MIN).and_utc();
    (start, start + chrono::Duration::days(1))
}

fn same_doctor(appointment: &Appointment, doctor_name: &str) -> bool {
    canonicalize_doctor_name(&appointment.doctor_name) == canonicalize_doctor_name(doctor_name)
}

fn in_window(appointment: &Appointment, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    appointment.scheduled_time >= start && appointment.scheduled_time < end
}

/// Next token for the doctor's day containing `scheduled_time`.
fn next_token(inner: &Inner, doctor_name: &str, scheduled_time: DateTime<Utc>) -> i32 {
    let (start, end) = day_of(scheduled_time);
    inner
        .appointments
        .values()
        .filter(|a| same_doctor(a, doctor_name) && in_window(a, start, end))
        .filter_map(|a| a.token_number)
        .max()
        .unwrap_or(0)
        + 1
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert_appointment(&self, new: NewAppointment) -> Result<Appointment, WardError> {
        let now = Utc::now();
        let appointment = Appointment {
            id: AppointmentId::new(),
            patient_id: new.patient_id,
            requested_by: new.requested_by,
            patient_name: new.patient_name,
            patient_phone: new.patient_phone,
            doctor_name: new.doctor_name,
            scheduled_time: new.scheduled_time,
            reason: new.reason,
            note: new.note,
            consultation_fee: 0,
            status: AppointmentStatus::PendingAdmin,
            payment_status: PaymentStatus::Pending,
            billing_status: BillingStatus::Unbilled,
            cancellation_reason: None,
            token_number: None,
            queue_status: None,
            created_at: now,
            updated_at: now,
        };
        self.lock()
            .appointments
            .insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn get_appointment(
        &self,
        id: AppointmentId,
    ) -> Result<Option<Appointment>, WardError> {
        Ok(self.lock().appointments.get(&id).cloned())
    }

    async fn update_if_status(
        &self,
        id: AppointmentId,
        allowed_from: &[AppointmentStatus],
        to: AppointmentStatus,
        change: AppointmentChange,
    ) -> Result<TransitionOutcome, WardError> {
        let mut inner = self.lock();

        let Some(current) = inner.appointments.get(&id).cloned() else {
            return Ok(TransitionOutcome::NotFound);
        };
        if !allowed_from.contains(&current.status) {
            return Ok(TransitionOutcome::StatusMismatch {
                current: current.status,
            });
        }

        let mut updated = current;
        updated.status = to;
        if let Some(fee) = change.consultation_fee {
            updated.consultation_fee = fee;
        }
        if let Some(time) = change.scheduled_time {
            updated.scheduled_time = time;
        }
        if let Some(note) = change.note {
            updated.note = Some(note);
        }
        if let Some(reason) = change.cancellation_reason {
            updated.cancellation_reason = Some(reason);
        }
        if let Some(payment_status) = change.payment_status {
            updated.payment_status = payment_status;
        }
        if change.assign_queue_token && updated.token_number.is_none() {
            updated.token_number = Some(next_token(
                &inner,
                &updated.doctor_name,
                updated.scheduled_time,
            ));
            updated.queue_status.get_or_insert(QueueStatus::Waiting);
        }
        updated.updated_at = Utc::now();

        inner.appointments.insert(id, updated.clone());
        Ok(TransitionOutcome::Updated(updated))
    }

    async fn record_payment(
        &self,
        id: AppointmentId,
        payment_ref: &str,
    ) -> Result<TransitionOutcome, WardError> {
        let mut inner = self.lock();

        let Some(current) = inner.appointments.get(&id).cloned() else {
            return Ok(TransitionOutcome::NotFound);
        };
        if current.status != AppointmentStatus::PendingPayment {
            return Ok(TransitionOutcome::StatusMismatch {
                current: current.status,
            });
        }

        let mut updated = current;
        updated.status = AppointmentStatus::Scheduled;
        updated.payment_status = PaymentStatus::Paid;
        if updated.token_number.is_none() {
            updated.token_number = Some(next_token(
                &inner,
                &updated.doctor_name,
                updated.scheduled_time,
            ));
        }
        updated.queue_status.get_or_insert(QueueStatus::Waiting);
        updated.updated_at = Utc::now();

        inner.billing.push(BillingRecord {
            id: Uuid::new_v4(),
            appointment_id: id,
            amount: updated.consultation_fee,
            payment_ref: payment_ref.to_string(),
            created_at: Utc::now(),
        });
        inner.appointments.insert(id, updated.clone());
        Ok(TransitionOutcome::Updated(updated))
    }

    async fn update_billing_status(
        &self,
        id: AppointmentId,
        billing_status: BillingStatus,
    ) -> Result<Option<Appointment>, WardError> {
        let mut inner = self.lock();
        match inner.appointments.get_mut(&id) {
            Some(appointment) => {
                appointment.billing_status = billing_status;
                appointment.updated_at = Utc::now();
                Ok(Some(appointment.clone()))
            }
            None => Ok(None),
        }
    }

    async fn call_next(
        &self,
        doctor_name: &str,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> Result<CallNextOutcome, WardError> {
        // Both steps under one lock acquisition; concurrent callers
        // cannot interleave between completing and activating.
        let mut inner = self.lock();

        let completed_previous = inner
            .appointments
            .values()
            .find(|a| {
                same_doctor(a, doctor_name)
                    && in_window(a, day_start, day_end)
                    && a.queue_status == Some(QueueStatus::InConsultation)
            })
            .map(|a| a.id);

        if let Some(id) = completed_previous {
            if let Some(appointment) = inner.appointments.get_mut(&id) {
                appointment.queue_status = Some(QueueStatus::Completed);
                appointment.status = AppointmentStatus::Completed;
                appointment.updated_at = Utc::now();
            }
        }

        let next = inner
            .appointments
            .values()
            .filter(|a| {
                same_doctor(a, doctor_name)
                    && in_window(a, day_start, day_end)
                    && a.queue_status == Some(QueueStatus::Waiting)
                    && a.token_number.is_some()
            })
            .min_by_key(|a| a.token_number)
            .map(|a| a.id);

        match next {
            Some(id) => {
                let appointment = inner
                    .appointments
                    .get_mut(&id)
                    .expect("appointment disappeared under lock");
                appointment.queue_status = Some(QueueStatus::InConsultation);
                appointment.status = AppointmentStatus::Ongoing;
                appointment.updated_at = Utc::now();
                Ok(CallNextOutcome::Activated {
                    appointment: appointment.clone(),
                    completed_previous,
                })
            }
            None => Ok(CallNextOutcome::QueueEmpty { completed_previous }),
        }
    }

    async fn queue_view(
        &self,
        doctor_name: &str,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> Result<QueueView, WardError> {
        let inner = self.lock();

        let mut view = QueueView {
            doctor_name: doctor_name.to_string(),
            in_consultation: None,
            waiting: Vec::new(),
        };

        for appointment in inner.appointments.values() {
            if !same_doctor(appointment, doctor_name)
                || !in_window(appointment, day_start, day_end)
            {
                continue;
            }
            let Some(token_number) = appointment.token_number else {
                continue;
            };
            let entry = QueueEntry {
                appointment_id: appointment.id,
                patient_name: appointment.patient_name.clone(),
                token_number,
            };
            match appointment.queue_status {
                Some(QueueStatus::InConsultation) => view.in_consultation = Some(entry),
                Some(QueueStatus::Waiting) => view.waiting.push(entry),
                _ => {}
            }
        }

        view.waiting.sort_by_key(|e| e.token_number);
        Ok(view)
    }

    async fn billing_records(
        &self,
        id: AppointmentId,
    ) -> Result<Vec<BillingRecord>, WardError> {
        let mut records: Vec<BillingRecord> = self
            .lock()
            .billing
            .iter()
            .filter(|r| r.appointment_id == id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    async fn revenue_by_doctor(&self) -> Result<Vec<DoctorRevenue>, WardError> {
        let inner = self.lock();

        let mut by_doctor: HashMap<String, DoctorRevenue> = HashMap::new();
        for record in &inner.billing {
            let Some(appointment) = inner.appointments.get(&record.appointment_id) else {
                continue;
            };
            let entry = by_doctor
                .entry(appointment.doctor_name.clone())
                .or_insert_with(|| DoctorRevenue {
                    doctor_name: appointment.doctor_name.clone(),
                    total_amount: 0,
                    payment_count: 0,
                });
            entry.total_amount += record.amount;
            entry.payment_count += 1;
        }

        let mut revenue: Vec<DoctorRevenue> = by_doctor.into_values().collect();
        revenue.sort_by(|a, b| {
            b.total_amount
                .cmp(&a.total_amount)
                .then_with(|| a.doctor_name.cmp(&b.doctor_name))
        });
        Ok(revenue)
    }
}

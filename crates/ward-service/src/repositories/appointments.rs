//! Postgres-backed record store.
//!
//! All queries use parameterized statements. Guarded transitions are
//! single conditional updates (`UPDATE ... WHERE status = ANY(...)`
//! with `RETURNING`), so two concurrent confirmations of the same
//! appointment cannot both succeed. Call-next serializes per doctor
//! with a transaction-scoped advisory lock.

use crate::errors::WardError;
use crate::models::{
    Appointment, AppointmentStatus, BillingRecord, BillingStatus, DoctorRevenue, PaymentStatus,
    QueueEntry, QueueStatus, QueueView,
};
use crate::repositories::{
    AppointmentChange, CallNextOutcome, NewAppointment, RecordStore, TransitionOutcome,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::types::{AppointmentId, PatientId};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

/// Record store backed by a Postgres pool.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Re-fetch to distinguish NotFound from a failed status guard
    /// after a conditional update matched no rows.
    async fn classify_miss(&self, id: AppointmentId) -> Result<TransitionOutcome, WardError> {
        match self.get_appointment(id).await? {
            Some(current) => Ok(TransitionOutcome::StatusMismatch {
                current: current.status,
            }),
            None => Ok(TransitionOutcome::NotFound),
        }
    }
}

const APPOINTMENT_COLUMNS: &str = r#"
    id, patient_id, requested_by, patient_name, patient_phone, doctor_name,
    scheduled_time, reason, note, consultation_fee, status, payment_status,
    billing_status, cancellation_reason, token_number, queue_status,
    created_at, updated_at
"#;

#[async_trait]
impl RecordStore for PgRecordStore {
    #[instrument(skip_all, fields(doctor = %new.doctor_name))]
    async fn insert_appointment(&self, new: NewAppointment) -> Result<Appointment, WardError> {
        let row: AppointmentRow = sqlx::query_as(
            r#"
            INSERT INTO appointments (
                id, patient_id, requested_by, patient_name, patient_phone,
                doctor_name, scheduled_time, reason, note,
                consultation_fee, status, payment_status, billing_status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 0, 'pending_admin', 'pending', 'unbilled')
            RETURNING
                id, patient_id, requested_by, patient_name, patient_phone, doctor_name,
                scheduled_time, reason, note, consultation_fee, status, payment_status,
                billing_status, cancellation_reason, token_number, queue_status,
                created_at, updated_at
            "#,
        )
        .bind(AppointmentId::new().0)
        .bind(new.patient_id.map(|p| p.0))
        .bind(new.requested_by)
        .bind(new.patient_name)
        .bind(new.patient_phone)
        .bind(new.doctor_name)
        .bind(new.scheduled_time)
        .bind(new.reason)
        .bind(new.note)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    #[instrument(skip_all, fields(appointment_id = %id))]
    async fn get_appointment(
        &self,
        id: AppointmentId,
    ) -> Result<Option<Appointment>, WardError> {
        let row: Option<AppointmentRow> = sqlx::query_as(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Appointment::try_from).transpose()
    }

    #[instrument(skip_all, fields(appointment_id = %id, to = %to))]
    async fn update_if_status(
        &self,
        id: AppointmentId,
        allowed_from: &[AppointmentStatus],
        to: AppointmentStatus,
        change: AppointmentChange,
    ) -> Result<TransitionOutcome, WardError> {
        let allowed: Vec<String> = allowed_from.iter().map(|s| s.as_str().to_string()).collect();

        // Token allocation is correlated on the appointment's own
        // (possibly updated) scheduled day, so the guard, the field
        // writes and the allocation land in one statement. Days are
        // truncated in UTC to match the queue window regardless of the
        // session time zone.
        let row: Option<AppointmentRow> = sqlx::query_as(
            r#"
            UPDATE appointments
            SET status = $2,
                consultation_fee = COALESCE($3, consultation_fee),
                scheduled_time = COALESCE($4, scheduled_time),
                note = COALESCE($5, note),
                cancellation_reason = COALESCE($6, cancellation_reason),
                payment_status = COALESCE($7, payment_status),
                token_number = CASE
                    WHEN $8 THEN COALESCE(
                        token_number,
                        (SELECT COALESCE(MAX(a2.token_number), 0) + 1
                         FROM appointments a2
                         WHERE lower(a2.doctor_name) = lower(appointments.doctor_name)
                           AND date_trunc('day', a2.scheduled_time AT TIME ZONE 'UTC')
                             = date_trunc('day', COALESCE($4, appointments.scheduled_time) AT TIME ZONE 'UTC'))
                    )
                    ELSE token_number
                END,
                queue_status = CASE
                    WHEN $8 THEN COALESCE(queue_status, 'waiting')
                    ELSE queue_status
                END,
                updated_at = NOW()
            WHERE id = $1 AND status = ANY($9)
            RETURNING
                id, patient_id, requested_by, patient_name, patient_phone, doctor_name,
                scheduled_time, reason, note, consultation_fee, status, payment_status,
                billing_status, cancellation_reason, token_number, queue_status,
                created_at, updated_at
            "#,
        )
        .bind(id.0)
        .bind(to.as_str())
        .bind(change.consultation_fee)
        .bind(change.scheduled_time)
        .bind(change.note)
        .bind(change.cancellation_reason)
        .bind(change.payment_status.map(|p| p.as_str()))
        .bind(change.assign_queue_token)
        .bind(&allowed)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(TransitionOutcome::Updated(row.try_into()?)),
            None => self.classify_miss(id).await,
        }
    }

    #[instrument(skip_all, fields(appointment_id = %id))]
    async fn record_payment(
        &self,
        id: AppointmentId,
        payment_ref: &str,
    ) -> Result<TransitionOutcome, WardError> {
        // Transition, token allocation and billing insert as one
        // statement; a failed guard writes nothing.
        let row: Option<AppointmentRow> = sqlx::query_as(
            r#"
            WITH updated AS (
                UPDATE appointments
                SET status = 'scheduled',
                    payment_status = 'paid',
                    token_number = COALESCE(
                        token_number,
                        (SELECT COALESCE(MAX(a2.token_number), 0) + 1
                         FROM appointments a2
                         WHERE lower(a2.doctor_name) = lower(appointments.doctor_name)
                           AND date_trunc('day', a2.scheduled_time AT TIME ZONE 'UTC')
                             = date_trunc('day', appointments.scheduled_time AT TIME ZONE 'UTC'))
                    ),
                    queue_status = COALESCE(queue_status, 'waiting'),
                    updated_at = NOW()
                WHERE id = $1 AND status = 'pending_payment'
                RETURNING
                    id, patient_id, requested_by, patient_name, patient_phone, doctor_name,
                    scheduled_time, reason, note, consultation_fee, status, payment_status,
                    billing_status, cancellation_reason, token_number, queue_status,
                    created_at, updated_at
            ), bill AS (
                INSERT INTO billing_records (id, appointment_id, amount, payment_ref)
                SELECT $3, id, consultation_fee, $2 FROM updated
            )
            SELECT * FROM updated
            "#,
        )
        .bind(id.0)
        .bind(payment_ref)
        .bind(Uuid::new_v4())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(TransitionOutcome::Updated(row.try_into()?)),
            None => self.classify_miss(id).await,
        }
    }

    #[instrument(skip_all, fields(appointment_id = %id, billing_status = %billing_status.as_str()))]
    async fn update_billing_status(
        &self,
        id: AppointmentId,
        billing_status: BillingStatus,
    ) -> Result<Option<Appointment>, WardError> {
        let row: Option<AppointmentRow> = sqlx::query_as(
            r#"
            UPDATE appointments
            SET billing_status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING
                id, patient_id, requested_by, patient_name, patient_phone, doctor_name,
                scheduled_time, reason, note, consultation_fee, status, payment_status,
                billing_status, cancellation_reason, token_number, queue_status,
                created_at, updated_at
            "#,
        )
        .bind(id.0)
        .bind(billing_status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Appointment::try_from).transpose()
    }

    #[instrument(skip_all, fields(doctor = %doctor_name))]
    async fn call_next(
        &self,
        doctor_name: &str,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> Result<CallNextOutcome, WardError> {
        let mut tx = self.pool.begin().await?;

        // Serialize call-next per doctor for the span of this
        // transaction; two concurrent callers cannot both activate.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext(lower($1)))")
            .bind(doctor_name)
            .execute(&mut *tx)
            .await?;

        let completed: Option<IdRow> = sqlx::query_as(
            r#"
            UPDATE appointments
            SET queue_status = 'completed', status = 'completed', updated_at = NOW()
            WHERE lower(doctor_name) = lower($1)
              AND queue_status = 'in_consultation'
              AND scheduled_time >= $2 AND scheduled_time < $3
            RETURNING id
            "#,
        )
        .bind(doctor_name)
        .bind(day_start)
        .bind(day_end)
        .fetch_optional(&mut *tx)
        .await?;

        let activated: Option<AppointmentRow> = sqlx::query_as(
            r#"
            UPDATE appointments
            SET queue_status = 'in_consultation', status = 'ongoing', updated_at = NOW()
            WHERE id = (
                SELECT id FROM appointments
                WHERE lower(doctor_name) = lower($1)
                  AND queue_status = 'waiting'
                  AND scheduled_time >= $2 AND scheduled_time < $3
                ORDER BY token_number ASC
                LIMIT 1
            )
            RETURNING
                id, patient_id, requested_by, patient_name, patient_phone, doctor_name,
                scheduled_time, reason, note, consultation_fee, status, payment_status,
                billing_status, cancellation_reason, token_number, queue_status,
                created_at, updated_at
            "#,
        )
        .bind(doctor_name)
        .bind(day_start)
        .bind(day_end)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;

        let completed_previous = completed.map(|r| AppointmentId(r.id));
        match activated {
            Some(row) => Ok(CallNextOutcome::Activated {
                appointment: row.try_into()?,
                completed_previous,
            }),
            None => Ok(CallNextOutcome::QueueEmpty { completed_previous }),
        }
    }

    #[instrument(skip_all, fields(doctor = %doctor_name))]
    async fn queue_view(
        &self,
        doctor_name: &str,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> Result<QueueView, WardError> {
        let rows: Vec<QueueEntryRow> = sqlx::query_as(
            r#"
            SELECT id, patient_name, token_number, queue_status
            FROM appointments
            WHERE lower(doctor_name) = lower($1)
              AND queue_status IN ('waiting', 'in_consultation')
              AND token_number IS NOT NULL
              AND scheduled_time >= $2 AND scheduled_time < $3
            ORDER BY token_number ASC
            "#,
        )
        .bind(doctor_name)
        .bind(day_start)
        .bind(day_end)
        .fetch_all(&self.pool)
        .await?;

        let mut view = QueueView {
            doctor_name: doctor_name.to_string(),
            in_consultation: None,
            waiting: Vec::new(),
        };
        for row in rows {
            let entry = QueueEntry {
                appointment_id: AppointmentId(row.id),
                patient_name: row.patient_name,
                token_number: row.token_number,
            };
            if row.queue_status == QueueStatus::InConsultation.as_str() {
                view.in_consultation = Some(entry);
            } else {
                view.waiting.push(entry);
            }
        }
        Ok(view)
    }

    #[instrument(skip_all, fields(appointment_id = %id))]
    async fn billing_records(
        &self,
        id: AppointmentId,
    ) -> Result<Vec<BillingRecord>, WardError> {
        let rows: Vec<BillingRow> = sqlx::query_as(
            r#"
            SELECT id, appointment_id, amount, payment_ref, created_at
            FROM billing_records
            WHERE appointment_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| BillingRecord {
                id: r.id,
                appointment_id: AppointmentId(r.appointment_id),
                amount: r.amount,
                payment_ref: r.payment_ref,
                created_at: r.created_at,
            })
            .collect())
    }

    #[instrument(skip_all)]
    async fn revenue_by_doctor(&self) -> Result<Vec<DoctorRevenue>, WardError> {
        let rows: Vec<RevenueRow> = sqlx::query_as(
            r#"
            SELECT a.doctor_name,
                   COALESCE(SUM(b.amount), 0) AS total_amount,
                   COUNT(b.id) AS payment_count
            FROM billing_records b
            JOIN appointments a ON a.id = b.appointment_id
            GROUP BY a.doctor_name
            ORDER BY total_amount DESC, a.doctor_name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| DoctorRevenue {
                doctor_name: r.doctor_name,
                total_amount: r.total_amount,
                payment_count: r.payment_count,
            })
            .collect())
    }
}

// ============================================================================
// Database Row Types
// ============================================================================

#[derive(sqlx::FromRow)]
struct AppointmentRow {
    id: Uuid,
    patient_id: Option<Uuid>,
    requested_by: Option<String>,
    patient_name: String,
    patient_phone: Option<String>,
    doctor_name: String,
    scheduled_time: DateTime<Utc>,
    reason: String,
    note: Option<String>,
    consultation_fee: i64,
    status: String,
    payment_status: String,
    billing_status: String,
    cancellation_reason: Option<String>,
    token_number: Option<i32>,
    queue_status: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = WardError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        let status = AppointmentStatus::parse(&row.status)
            .ok_or_else(|| WardError::Database(format!("unknown status '{}'", row.status)))?;
        let payment_status = PaymentStatus::parse(&row.payment_status).ok_or_else(|| {
            WardError::Database(format!("unknown payment status '{}'", row.payment_status))
        })?;
        let billing_status = BillingStatus::parse(&row.billing_status).ok_or_else(|| {
            WardError::Database(format!("unknown billing status '{}'", row.billing_status))
        })?;
        let queue_status = row
            .queue_status
            .as_deref()
            .map(|s| {
                QueueStatus::parse(s)
                    .ok_or_else(|| WardError::Database(format!("unknown queue status '{s}'")))
            })
            .transpose()?;

        Ok(Appointment {
            id: AppointmentId(row.id),
            patient_id: row.patient_id.map(PatientId),
            requested_by: row.requested_by,
            patient_name: row.patient_name,
            patient_phone: row.patient_phone,
            doctor_name: row.doctor_name,
            scheduled_time: row.scheduled_time,
            reason: row.reason,
            note: row.note,
            consultation_fee: row.consultation_fee,
            status,
            payment_status,
            billing_status,
            cancellation_reason: row.cancellation_reason,
            token_number: row.token_number,
            queue_status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct IdRow {
    id: Uuid,
}

#[derive(sqlx::FromRow)]
struct QueueEntryRow {
    id: Uuid,
    patient_name: String,
    token_number: i32,
    queue_status: String,
}

#[derive(sqlx::FromRow)]
struct RevenueRow {
    doctor_name: String,
    total_amount: i64,
    payment_count: i64,
}

#[derive(sqlx::FromRow)]
struct BillingRow {
    id: Uuid,
    appointment_id: Uuid,
    amount: i64,
    payment_ref: String,
    created_at: DateTime<Utc>,
}

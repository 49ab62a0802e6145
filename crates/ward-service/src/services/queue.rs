//! Per-doctor consultation queue.
//!
//! The queue is a derived view over appointments scheduled for the
//! current UTC day, ordered by token number. Call-next completes
//! the current in-consultation entry and activates the lowest waiting
//! token as one serialized store operation, so two concurrent callers
//! can never leave two entries in consultation.

use crate::errors::WardError;
use crate::models::QueueView;
use crate::repositories::{CallNextOutcome, RecordStore};
use crate::services::notifications::Dispatcher;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;

#[derive(Clone)]
pub struct QueueService {
    store: Arc<dyn RecordStore>,
    dispatcher: Dispatcher,
}

impl QueueService {
    pub fn new(store: Arc<dyn RecordStore>, dispatcher: Dispatcher) -> Self {
        Self { store, dispatcher }
    }

    /// Advance the doctor's queue: complete the current consultation
    /// (if any) and activate the lowest waiting token. Returns the
    /// outcome; "queue empty" after completing the last entry is a
    /// legitimate result, not an error.
    #[instrument(skip_all, fields(doctor = %doctor_name))]
    pub async fn call_next(&self, doctor_name: &str) -> Result<CallNextOutcome, WardError> {
        let (day_start, day_end) = today_window();
        let outcome = self
            .store
            .call_next(doctor_name, day_start, day_end)
            .await?;

        match &outcome {
            CallNextOutcome::Activated {
                appointment,
                completed_previous,
            } => {
                tracing::info!(
                    target: "ward.service.queue",
                    doctor = %doctor_name,
                    token = ?appointment.token_number,
                    completed_previous = ?completed_previous,
                    "Activated next queue entry"
                );
                self.dispatcher
                    .publish_queue_update(
                        doctor_name,
                        json!({
                            "doctor_name": doctor_name,
                            "active_token": appointment.token_number,
                            "active_appointment_id": appointment.id,
                            "completed_appointment_id": completed_previous,
                        }),
                    )
                    .await;
            }
            CallNextOutcome::QueueEmpty { completed_previous } => {
                tracing::info!(
                    target: "ward.service.queue",
                    doctor = %doctor_name,
                    completed_previous = ?completed_previous,
                    "Queue empty"
                );
                // Only the completion of the last entry is news.
                if completed_previous.is_some() {
                    self.dispatcher
                        .publish_queue_update(
                            doctor_name,
                            json!({
                                "doctor_name": doctor_name,
                                "active_token": null,
                                "completed_appointment_id": completed_previous,
                            }),
                        )
                        .await;
                }
            }
        }

        Ok(outcome)
    }

    /// Snapshot of the doctor's queue for today.
    #[instrument(skip_all, fields(doctor = %doctor_name))]
    pub async fn queue_view(&self, doctor_name: &str) -> Result<QueueView, WardError> {
        let (day_start, day_end) = today_window();
        self.store.queue_view(doctor_name, day_start, day_end).await
    }
}

/// The `[00:00, 24:00)` window of the current UTC day. Token
/// allocation truncates scheduled times to the same UTC day, so the
/// window seen by the queue and the day a token was allocated for can
/// never disagree, whatever the server's local time zone.
fn today_window() -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1))
}

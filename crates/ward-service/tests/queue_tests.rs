//! Consultation queue tests.
//!
//! Token allocation, call-next rotation, and the single-consultation
//! invariant under concurrent callers, all on the `TestWard` harness.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing, clippy::panic)]

use chrono::Utc;
use ward_service::models::Appointment;
use ward_service::repositories::CallNextOutcome;
use ward_service::services::appointments::CreateRequest;
use ward_test_utils::TestWard;

const DOCTOR: &str = "Dr. Miranda Bailey";

/// Create and admin-schedule one appointment for today, which
/// allocates the next queue token.
async fn schedule_patient(
    ward: &TestWard,
    doctor: &str,
    patient: &str,
) -> Result<Appointment, anyhow::Error> {
    let appointment = ward
        .appointments
        .create(CreateRequest {
            patient_name: Some(patient.to_string()),
            doctor_name: Some(doctor.to_string()),
            scheduled_time: Some(Utc::now()),
            reason: Some("Consultation".to_string()),
            ..CreateRequest::default()
        })
        .await?;
    Ok(ward.appointments.schedule(appointment.id, None, None).await?)
}

/// Both concurrent callers on an empty queue get a clean empty result;
/// neither invents an active entry.
#[tokio::test]
async fn test_call_next_on_empty_queue_concurrent() -> Result<(), anyhow::Error> {
    let ward = TestWard::spawn().await;

    let (a, b) = tokio::join!(
        ward.queue.call_next(DOCTOR),
        ward.queue.call_next(DOCTOR)
    );
    assert!(matches!(
        a?,
        CallNextOutcome::QueueEmpty {
            completed_previous: None
        }
    ));
    assert!(matches!(
        b?,
        CallNextOutcome::QueueEmpty {
            completed_previous: None
        }
    ));

    let view = ward.queue.queue_view(DOCTOR).await?;
    assert!(view.in_consultation.is_none());
    assert!(view.waiting.is_empty());

    ward.shutdown().await;
    Ok(())
}

/// Tokens are allocated in scheduling order and consumed lowest-first;
/// each activation completes the previous consultation.
#[tokio::test]
async fn test_call_next_rotates_in_token_order() -> Result<(), anyhow::Error> {
    let ward = TestWard::spawn().await;

    let first = schedule_patient(&ward, DOCTOR, "Patient One").await?;
    let second = schedule_patient(&ward, DOCTOR, "Patient Two").await?;
    let third = schedule_patient(&ward, DOCTOR, "Patient Three").await?;
    assert_eq!(first.token_number, Some(1));
    assert_eq!(second.token_number, Some(2));
    assert_eq!(third.token_number, Some(3));

    let outcome = ward.queue.call_next(DOCTOR).await?;
    let CallNextOutcome::Activated {
        appointment,
        completed_previous,
    } = outcome
    else {
        panic!("expected activation");
    };
    assert_eq!(appointment.id, first.id);
    assert_eq!(appointment.token_number, Some(1));
    assert_eq!(completed_previous, None);

    let view = ward.queue.queue_view(DOCTOR).await?;
    assert_eq!(
        view.in_consultation.as_ref().map(|e| e.token_number),
        Some(1)
    );
    assert_eq!(
        view.waiting.iter().map(|e| e.token_number).collect::<Vec<_>>(),
        vec![2, 3]
    );

    let outcome = ward.queue.call_next(DOCTOR).await?;
    let CallNextOutcome::Activated {
        appointment,
        completed_previous,
    } = outcome
    else {
        panic!("expected activation");
    };
    assert_eq!(appointment.id, second.id);
    assert_eq!(completed_previous, Some(first.id));

    // The displaced entry is fully completed, not left dangling.
    let done = ward.store.snapshot(first.id).unwrap();
    assert_eq!(done.status, ward_service::models::AppointmentStatus::Completed);

    ward.queue.call_next(DOCTOR).await?;
    let outcome = ward.queue.call_next(DOCTOR).await?;
    assert!(matches!(
        outcome,
        CallNextOutcome::QueueEmpty {
            completed_previous: Some(id)
        } if id == third.id
    ));

    ward.shutdown().await;
    Ok(())
}

/// Two concurrent call-next operations never leave two entries in
/// consultation; they resolve to consecutive activations.
#[tokio::test]
async fn test_concurrent_call_next_single_consultation() -> Result<(), anyhow::Error> {
    let ward = TestWard::spawn().await;
    schedule_patient(&ward, DOCTOR, "Patient One").await?;
    schedule_patient(&ward, DOCTOR, "Patient Two").await?;

    let (a, b) = tokio::join!(
        ward.queue.call_next(DOCTOR),
        ward.queue.call_next(DOCTOR)
    );

    let mut active_tokens = Vec::new();
    for outcome in [a?, b?] {
        let CallNextOutcome::Activated { appointment, .. } = outcome else {
            panic!("expected activation");
        };
        active_tokens.push(appointment.token_number);
    }
    active_tokens.sort();
    assert_eq!(active_tokens, vec![Some(1), Some(2)]);

    let view = ward.queue.queue_view(DOCTOR).await?;
    assert_eq!(
        view.in_consultation.as_ref().map(|e| e.token_number),
        Some(2)
    );
    assert!(view.waiting.is_empty());

    ward.shutdown().await;
    Ok(())
}

/// The allocation day and the queue window share the same UTC day
/// boundary: appointments at opposite ends of one UTC day draw from a
/// single token sequence and land in a single queue view, whatever
/// the server's local time zone.
#[tokio::test]
async fn test_token_day_matches_queue_window() -> Result<(), anyhow::Error> {
    let ward = TestWard::spawn().await;
    let today = Utc::now().date_naive();
    let early = today.and_hms_opt(0, 30, 0).unwrap().and_utc();
    let late = today.and_hms_opt(23, 0, 0).unwrap().and_utc();

    let mut tokens = Vec::new();
    for time in [early, late] {
        let appointment = ward
            .appointments
            .create(CreateRequest {
                patient_name: Some("Patient".to_string()),
                doctor_name: Some(DOCTOR.to_string()),
                scheduled_time: Some(time),
                reason: Some("Consultation".to_string()),
                ..CreateRequest::default()
            })
            .await?;
        let appointment = ward.appointments.schedule(appointment.id, None, None).await?;
        tokens.push(appointment.token_number);
    }
    assert_eq!(tokens, vec![Some(1), Some(2)]);

    let view = ward.queue.queue_view(DOCTOR).await?;
    assert_eq!(
        view.waiting.iter().map(|e| e.token_number).collect::<Vec<_>>(),
        vec![1, 2]
    );

    ward.shutdown().await;
    Ok(())
}

/// Tokens are per doctor per day, and doctor addressing ignores case
/// and whitespace variation.
#[tokio::test]
async fn test_tokens_are_per_doctor_and_case_insensitive() -> Result<(), anyhow::Error> {
    let ward = TestWard::spawn().await;

    let a1 = schedule_patient(&ward, DOCTOR, "Patient One").await?;
    let a2 = schedule_patient(&ward, "DR.  MIRANDA  BAILEY", "Patient Two").await?;
    let b1 = schedule_patient(&ward, "Dr. Derek Shepherd", "Patient Three").await?;

    assert_eq!(a1.token_number, Some(1));
    // Same doctor under canonicalization, so the sequence continues.
    assert_eq!(a2.token_number, Some(2));
    // Different doctor, independent sequence.
    assert_eq!(b1.token_number, Some(1));

    let view = ward.queue.queue_view("dr. miranda bailey").await?;
    assert_eq!(
        view.waiting.iter().map(|e| e.token_number).collect::<Vec<_>>(),
        vec![1, 2]
    );

    ward.shutdown().await;
    Ok(())
}

//! Call-setup signaling tests.
//!
//! The signaling endpoints are a stateless relay: these tests assert
//! that offers and candidates land on the target's room, that the
//! caller identity is attached, and that an offline callee yields a
//! zero delivery count rather than an error.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing, clippy::panic)]

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use event_fabric::RoomKey;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use ward_service::auth::{ACTOR_ID_HEADER, DISPLAY_NAME_HEADER, ROLE_HEADER};
use ward_test_utils::TestWard;

const DOCTOR: &str = "Dr. Amelia Shepherd";

async fn body_json(response: axum::response::Response) -> Result<Value, anyhow::Error> {
    let bytes = response.into_body().collect().await?.to_bytes();
    Ok(serde_json::from_slice(&bytes)?)
}

fn patient_offer(patient_id: Uuid, offer: Value) -> Result<Request<Body>, anyhow::Error> {
    Ok(Request::post("/v1/calls/offer")
        .header(ROLE_HEADER, "patient")
        .header(ACTOR_ID_HEADER, patient_id.to_string())
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "target": { "role": "doctor", "doctor_name": DOCTOR },
                "offer": offer,
            })
            .to_string(),
        ))?)
}

/// An offer lands on the callee's room with the opaque payload intact
/// and the caller identity attached.
#[tokio::test]
async fn test_offer_reaches_doctor_room() -> Result<(), anyhow::Error> {
    let ward = TestWard::spawn().await;
    let (_conn, mut doctor_rx) = ward.subscribe(&[RoomKey::doctor(DOCTOR)]).await;

    let patient_id = Uuid::new_v4();
    let offer = json!({"type": "offer", "sdp": "v=0..."});
    let response = ward
        .router
        .clone()
        .oneshot(patient_offer(patient_id, offer.clone())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await?;
    assert_eq!(body["delivered"], 1);

    let envelope = doctor_rx.try_recv()?;
    assert_eq!(envelope.event, "incoming_call");
    assert_eq!(envelope.data["offer"], offer);
    assert_eq!(envelope.data["from"]["role"], "patient");
    assert_eq!(envelope.data["from"]["actor_id"], patient_id.to_string());

    ward.shutdown().await;
    Ok(())
}

/// Calling someone who is not online is not an error; the response
/// just reports zero deliveries.
#[tokio::test]
async fn test_offer_to_offline_callee_delivers_zero() -> Result<(), anyhow::Error> {
    let ward = TestWard::spawn().await;

    let response = ward
        .router
        .clone()
        .oneshot(patient_offer(Uuid::new_v4(), json!({"type": "offer"}))?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await?;
    assert_eq!(body["delivered"], 0);

    ward.shutdown().await;
    Ok(())
}

/// Answer and candidate flow back to the caller's patient room.
#[tokio::test]
async fn test_answer_and_candidate_reach_caller() -> Result<(), anyhow::Error> {
    let ward = TestWard::spawn().await;
    let patient_id = Uuid::new_v4();
    let (_conn, mut patient_rx) = ward.subscribe(&[RoomKey::patient(patient_id)]).await;

    let doctor_request = |path: &str, body: Value| -> Result<Request<Body>, anyhow::Error> {
        Ok(Request::post(path)
            .header(ROLE_HEADER, "doctor")
            .header(ACTOR_ID_HEADER, Uuid::new_v4().to_string())
            .header(DISPLAY_NAME_HEADER, DOCTOR)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))?)
    };
    let target = json!({ "role": "patient", "patient_id": patient_id });

    let response = ward
        .router
        .clone()
        .oneshot(doctor_request(
            "/v1/calls/answer",
            json!({ "target": target, "answer": {"type": "answer"} }),
        )?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = ward
        .router
        .clone()
        .oneshot(doctor_request(
            "/v1/calls/candidate",
            json!({ "target": target, "candidate": {"candidate": "candidate:0"} }),
        )?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = ward
        .router
        .clone()
        .oneshot(doctor_request("/v1/calls/end", json!({ "target": target }))?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let events: Vec<String> = std::iter::from_fn(|| patient_rx.try_recv().ok())
        .map(|e| e.event)
        .collect();
    assert_eq!(events, vec!["call_accepted", "ice_candidate", "call_ended"]);

    ward.shutdown().await;
    Ok(())
}

/// A target with no resolvable room is rejected up front.
#[tokio::test]
async fn test_offer_without_target_identity_is_rejected() -> Result<(), anyhow::Error> {
    let ward = TestWard::spawn().await;

    let response = ward
        .router
        .clone()
        .oneshot(
            Request::post("/v1/calls/offer")
                .header(ROLE_HEADER, "patient")
                .header(ACTOR_ID_HEADER, Uuid::new_v4().to_string())
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({
                        "target": { "role": "doctor" },
                        "offer": {"type": "offer"},
                    })
                    .to_string(),
                ))?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await?;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    ward.shutdown().await;
    Ok(())
}

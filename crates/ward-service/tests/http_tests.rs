//! HTTP surface tests.
//!
//! Exercises the router end to end with `tower::ServiceExt::oneshot`:
//! identity resolution from trusted headers, role enforcement, error
//! body shape, and the public health endpoint.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing, clippy::panic)]

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use ward_service::auth::{ACTOR_ID_HEADER, ROLE_HEADER};
use ward_test_utils::TestWard;

async fn body_json(response: axum::response::Response) -> Result<Value, anyhow::Error> {
    let bytes = response.into_body().collect().await?.to_bytes();
    Ok(serde_json::from_slice(&bytes)?)
}

#[tokio::test]
async fn test_health_is_public() -> Result<(), anyhow::Error> {
    let ward = TestWard::spawn().await;

    let response = ward
        .router
        .clone()
        .oneshot(Request::get("/v1/health").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await?;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["ward_id"], "ward-test");

    ward.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_missing_identity_is_unauthorized() -> Result<(), anyhow::Error> {
    let ward = TestWard::spawn().await;

    let response = ward
        .router
        .clone()
        .oneshot(
            Request::get(format!("/v1/appointments/{}", Uuid::new_v4()))
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));

    let body = body_json(response).await?;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    ward.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_create_appointment_over_http() -> Result<(), anyhow::Error> {
    let ward = TestWard::spawn().await;
    let patient_id = Uuid::new_v4();

    let response = ward
        .router
        .clone()
        .oneshot(
            Request::post("/v1/appointments")
                .header(ROLE_HEADER, "patient")
                .header(ACTOR_ID_HEADER, patient_id.to_string())
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({
                        "patient_name": "Asha Rao",
                        "doctor_name": "Dr. Grey",
                        "scheduled_time": "2026-08-27T09:00:00Z",
                        "reason": "Annual checkup",
                    })
                    .to_string(),
                ))?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await?;
    assert_eq!(body["status"], "pending_admin");
    // The requesting patient is implicitly the subject.
    assert_eq!(body["patient_id"], patient_id.to_string());

    ward.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_schedule_requires_admin_role() -> Result<(), anyhow::Error> {
    let ward = TestWard::spawn().await;

    let response = ward
        .router
        .clone()
        .oneshot(
            Request::post(format!("/v1/appointments/{}/schedule", Uuid::new_v4()))
                .header(ROLE_HEADER, "patient")
                .header(ACTOR_ID_HEADER, Uuid::new_v4().to_string())
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = body_json(response).await?;
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    ward.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_missing_field_is_validation_error() -> Result<(), anyhow::Error> {
    let ward = TestWard::spawn().await;

    // No doctor_name: rejected by validation, not by deserialization.
    let response = ward
        .router
        .clone()
        .oneshot(
            Request::post("/v1/appointments")
                .header(ROLE_HEADER, "patient")
                .header(ACTOR_ID_HEADER, Uuid::new_v4().to_string())
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({
                        "scheduled_time": "2026-08-27T09:00:00Z",
                        "reason": "Annual checkup",
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

#[tokio::test]
async fn test_cancel_on_missing_appointment_is_not_found() -> Result<(), anyhow::Error> {
    let ward = TestWard::spawn().await;

    let response = ward
        .router
        .clone()
        .oneshot(
            Request::post(format!("/v1/appointments/{}/cancel", Uuid::new_v4()))
                .header(ROLE_HEADER, "admin")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"reason": "duplicate"}).to_string()))?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await?;
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    ward.shutdown().await;
    Ok(())
}

//! Call-setup signaling handlers.
//!
//! - `POST /v1/calls/offer` - offer a call to a target actor
//! - `POST /v1/calls/answer` - answer back to the caller
//! - `POST /v1/calls/candidate` - relay a connectivity candidate
//! - `POST /v1/calls/end` - end the call
//!
//! Payloads are opaque to the server; the target is named by role plus
//! identity and resolved to a room key.

use crate::errors::WardError;
use crate::routes::AppState;
use axum::{extract::State, Extension, Json};
use common::types::{ActorIdentity, ActorRole};
use event_fabric::RoomKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// The other end of a call, addressed the same way as any room.
#[derive(Debug, Deserialize)]
pub struct CallTarget {
    pub role: Option<String>,
    /// Required for patient targets.
    pub patient_id: Option<Uuid>,
    /// Required for doctor targets.
    pub doctor_name: Option<String>,
}

impl CallTarget {
    fn room(&self) -> Result<RoomKey, WardError> {
        let role = self
            .role
            .as_deref()
            .and_then(ActorRole::parse)
            .ok_or_else(|| WardError::Validation("target role is required".to_string()))?;
        match role {
            ActorRole::Patient => self
                .patient_id
                .map(RoomKey::patient)
                .ok_or_else(|| WardError::Validation("target patient_id is required".to_string())),
            ActorRole::Doctor => self
                .doctor_name
                .as_deref()
                .filter(|n| !n.trim().is_empty())
                .map(RoomKey::doctor)
                .ok_or_else(|| WardError::Validation("target doctor_name is required".to_string())),
            ActorRole::Admin => Ok(RoomKey::admins()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OfferRequest {
    pub target: CallTarget,
    pub offer: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub target: CallTarget,
    pub answer: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateRequest {
    pub target: CallTarget,
    pub candidate: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct EndRequest {
    pub target: CallTarget,
}

#[derive(Debug, Serialize)]
pub struct SignalResponse {
    /// Live connections the event was handed to. Zero means the target
    /// is not online; the caller decides how to proceed.
    pub delivered: usize,
}

/// Handler for POST /v1/calls/offer
#[instrument(skip_all, name = "ward.handlers.call_offer")]
pub async fn offer(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<ActorIdentity>,
    Json(body): Json<OfferRequest>,
) -> Result<Json<SignalResponse>, WardError> {
    let room = body.target.room()?;
    let offer = required_payload(body.offer, "offer")?;
    let delivered = state.signaling.incoming_call(&identity, room, offer).await?;
    Ok(Json(SignalResponse { delivered }))
}

/// Handler for POST /v1/calls/answer
#[instrument(skip_all, name = "ward.handlers.call_answer")]
pub async fn answer(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<ActorIdentity>,
    Json(body): Json<AnswerRequest>,
) -> Result<Json<SignalResponse>, WardError> {
    let room = body.target.room()?;
    let answer = required_payload(body.answer, "answer")?;
    let delivered = state.signaling.call_accepted(&identity, room, answer).await?;
    Ok(Json(SignalResponse { delivered }))
}

/// Handler for POST /v1/calls/candidate
#[instrument(skip_all, name = "ward.handlers.call_candidate")]
pub async fn candidate(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<ActorIdentity>,
    Json(body): Json<CandidateRequest>,
) -> Result<Json<SignalResponse>, WardError> {
    let room = body.target.room()?;
    let candidate = required_payload(body.candidate, "candidate")?;
    let delivered = state.signaling.ice_candidate(&identity, room, candidate).await?;
    Ok(Json(SignalResponse { delivered }))
}

/// Handler for POST /v1/calls/end
#[instrument(skip_all, name = "ward.handlers.call_end")]
pub async fn end(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<ActorIdentity>,
    Json(body): Json<EndRequest>,
) -> Result<Json<SignalResponse>, WardError> {
    let room = body.target.room()?;
    let delivered = state.signaling.call_ended(&identity, room).await?;
    Ok(Json(SignalResponse { delivered }))
}

fn required_payload(value: Option<Value>, field: &str) -> Result<Value, WardError> {
    value.ok_or_else(|| WardError::Validation(format!("{field} is required")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_target_resolution() {
        let id = Uuid::new_v4();
        let target = CallTarget {
            role: Some("patient".to_string()),
            patient_id: Some(id),
            doctor_name: None,
        };
        assert_eq!(target.room().unwrap(), RoomKey::patient(id));

        let target = CallTarget {
            role: Some("doctor".to_string()),
            patient_id: None,
            doctor_name: Some("Dr. Lee".to_string()),
        };
        assert_eq!(target.room().unwrap(), RoomKey::doctor("Dr. Lee"));
    }

    #[test]
    fn test_target_requires_identity_for_role() {
        let target = CallTarget {
            role: Some("doctor".to_string()),
            patient_id: None,
            doctor_name: None,
        };
        assert!(matches!(target.room(), Err(WardError::Validation(_))));

        let target = CallTarget {
            role: None,
            patient_id: None,
            doctor_name: None,
        };
        assert!(matches!(target.room(), Err(WardError::Validation(_))));
    }
}

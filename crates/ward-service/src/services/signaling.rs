//! Call-setup signaling.
//!
//! A thin, stateless reuse of the relay: session descriptions and
//! connectivity candidates are ferried between two parties' rooms and
//! never interpreted. No call state is kept server-side; "end call" is
//! just another publish, and a caller that never hears back simply
//! never proceeds.

use crate::errors::WardError;
use common::types::ActorIdentity;
use event_fabric::{RelayHandle, RoomKey};
use serde_json::{json, Value};
use tracing::instrument;

#[derive(Clone)]
pub struct SignalingService {
    relay: RelayHandle,
}

impl SignalingService {
    pub fn new(relay: RelayHandle) -> Self {
        Self { relay }
    }

    /// Offer a call to the target actor's room. Returns the number of
    /// live connections the offer reached; zero means the callee is
    /// not online.
    #[instrument(skip_all, fields(target = %target))]
    pub async fn incoming_call(
        &self,
        from: &ActorIdentity,
        target: RoomKey,
        offer: Value,
    ) -> Result<usize, WardError> {
        self.publish(target, "incoming_call", from, json!({ "offer": offer }))
            .await
    }

    /// Answer back to the original caller's room.
    #[instrument(skip_all, fields(target = %target))]
    pub async fn call_accepted(
        &self,
        from: &ActorIdentity,
        target: RoomKey,
        answer: Value,
    ) -> Result<usize, WardError> {
        self.publish(target, "call_accepted", from, json!({ "answer": answer }))
            .await
    }

    /// Relay one connectivity candidate to the other end.
    #[instrument(skip_all, fields(target = %target))]
    pub async fn ice_candidate(
        &self,
        from: &ActorIdentity,
        target: RoomKey,
        candidate: Value,
    ) -> Result<usize, WardError> {
        self.publish(
            target,
            "ice_candidate",
            from,
            json!({ "candidate": candidate }),
        )
        .await
    }

    /// Tell the other end the call is over.
    #[instrument(skip_all, fields(target = %target))]
    pub async fn call_ended(
        &self,
        from: &ActorIdentity,
        target: RoomKey,
    ) -> Result<usize, WardError> {
        self.publish(target, "call_ended", from, json!({})).await
    }

    async fn publish(
        &self,
        target: RoomKey,
        event: &'static str,
        from: &ActorIdentity,
        mut payload: Value,
    ) -> Result<usize, WardError> {
        if let Some(map) = payload.as_object_mut() {
            map.insert(
                "from".to_string(),
                json!({
                    "role": from.role,
                    "actor_id": from.actor_id,
                    "display_name": from.display_name,
                }),
            );
        }

        let delivered = self.relay.publish(target, event, payload).await?;
        tracing::debug!(
            target: "ward.service.signaling",
            event = event,
            delivered = delivered,
            "Relayed signaling event"
        );
        Ok(delivered)
    }
}

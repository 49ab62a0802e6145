//! Mailbox command and event envelope types.
//!
//! All relay interaction is strongly-typed message passing via
//! `tokio::sync::mpsc`. Commands that need an acknowledgement or a
//! result carry a `tokio::sync::oneshot` responder.

use crate::connection::ConnectionId;
use crate::room::RoomKey;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

/// One event as delivered to a subscribed connection.
///
/// The relay never interprets `data`; it is an opaque payload chosen by
/// the publisher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Event name, e.g. `"doctor_confirmation_request"`.
    pub event: String,
    /// Opaque payload.
    pub data: serde_json::Value,
}

impl EventEnvelope {
    /// Build an envelope.
    #[must_use]
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// Commands processed by the `RelayActor`.
#[derive(Debug)]
pub enum RelayMessage {
    /// A new connection opened; register its outbound channel.
    Connect {
        connection_id: ConnectionId,
        sender: mpsc::Sender<EventEnvelope>,
        /// Acknowledged once the registry has recorded the connection.
        respond_to: oneshot::Sender<()>,
    },

    /// Join a connection to a room (idempotent).
    Join {
        connection_id: ConnectionId,
        room: RoomKey,
        /// Acknowledged once membership is recorded.
        respond_to: oneshot::Sender<()>,
    },

    /// Publish an event to every connection currently in the room.
    Publish {
        room: RoomKey,
        envelope: EventEnvelope,
        /// Number of connections the event was handed to. Observability
        /// only; zero is not an error.
        respond_to: oneshot::Sender<usize>,
    },

    /// A connection closed; remove it from every room.
    Disconnect {
        connection_id: ConnectionId,
        /// Acknowledged once the connection is fully removed.
        respond_to: oneshot::Sender<()>,
    },

    /// Snapshot of registry state (for health/debugging).
    GetState {
        respond_to: oneshot::Sender<RelayState>,
    },
}

/// Point-in-time view of the registry.
#[derive(Debug, Clone, Serialize)]
pub struct RelayState {
    /// Number of live connections.
    pub connections: usize,
    /// Rooms with at least one subscriber.
    pub rooms: Vec<RoomInfo>,
}

/// Per-room membership info.
#[derive(Debug, Clone, Serialize)]
pub struct RoomInfo {
    /// Room key in display form.
    pub room: String,
    /// Current subscriber count.
    pub subscribers: usize,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_serializes_as_event_plus_data() {
        let envelope = EventEnvelope::new(
            "incoming_call",
            serde_json::json!({"sdp": "v=0"}),
        );
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["event"], "incoming_call");
        assert_eq!(json["data"]["sdp"], "v=0");
    }
}

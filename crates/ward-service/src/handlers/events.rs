//! Live event stream over WebSocket.
//!
//! `GET /v1/events` upgrades to a WebSocket. The connection registers
//! with the relay, joins the rooms its identity resolves to, and then
//! forwards relay envelopes as JSON text frames until either side
//! closes. Room membership is rebuilt from scratch on every connect
//! and cleared on disconnect; nothing is persisted.

use crate::routes::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    Extension,
};
use common::types::{ActorIdentity, ActorRole};
use event_fabric::{ConnectionId, RoomKey};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::instrument;

/// Handler for GET /v1/events
#[instrument(skip_all, name = "ward.handlers.events")]
pub async fn events(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<ActorIdentity>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(state, identity, socket))
}

/// Rooms a connection is subscribed to, derived from who opened it.
fn rooms_for_identity(identity: &ActorIdentity) -> Vec<RoomKey> {
    match identity.role {
        ActorRole::Admin => vec![RoomKey::admins()],
        ActorRole::Patient => identity
            .actor_id
            .map(RoomKey::patient)
            .into_iter()
            .collect(),
        ActorRole::Doctor => identity
            .display_name
            .as_deref()
            .map(RoomKey::doctor)
            .into_iter()
            .collect(),
    }
}

async fn handle_socket(state: Arc<AppState>, identity: ActorIdentity, socket: WebSocket) {
    let connection_id = ConnectionId::new();
    let (outbound_tx, mut outbound_rx) = mpsc::channel(state.config.connection_buffer);

    if let Err(e) = state.relay.on_connect(connection_id, outbound_tx).await {
        tracing::error!(
            target: "ward.handlers.events",
            connection_id = %connection_id,
            error = %e,
            "Failed to register connection with relay"
        );
        return;
    }

    for room in rooms_for_identity(&identity) {
        if let Err(e) = state.relay.on_join(connection_id, room.clone()).await {
            tracing::error!(
                target: "ward.handlers.events",
                connection_id = %connection_id,
                room = %room,
                error = %e,
                "Failed to join room"
            );
        }
    }

    tracing::info!(
        target: "ward.handlers.events",
        connection_id = %connection_id,
        role = identity.role.as_str(),
        "Event stream connected"
    );

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            envelope = outbound_rx.recv() => {
                let Some(envelope) = envelope else { break };
                let Ok(text) = serde_json::to_string(&envelope) else {
                    tracing::warn!(
                        target: "ward.handlers.events",
                        connection_id = %connection_id,
                        "Failed to serialize event envelope"
                    );
                    continue;
                };
                if sink.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            inbound = stream.next() => {
                match inbound {
                    // The stream is server-to-client; inbound frames
                    // other than close are ignored.
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    if let Err(e) = state.relay.on_disconnect(connection_id).await {
        tracing::warn!(
            target: "ward.handlers.events",
            connection_id = %connection_id,
            error = %e,
            "Failed to deregister connection"
        );
    }

    tracing::info!(
        target: "ward.handlers.events",
        connection_id = %connection_id,
        "Event stream disconnected"
    );
}

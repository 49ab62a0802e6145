//! `RelayActor` - the actor registry and room-addressed relay.
//!
//! One `RelayActor` per process owns all connection and room state:
//!
//! - `connections` maps each live connection to its outbound channel
//!   and the set of rooms it has joined
//! - `rooms` maps each room key to its current subscriber set
//!
//! The actor is injected wherever fan-out is needed by cloning its
//! [`RelayHandle`]; there is no module-level singleton, so tests can
//! spawn a private relay and register channel-backed fake connections.
//!
//! # Delivery semantics
//!
//! Fan-out uses `try_send` on each subscriber's outbound channel:
//! at-most-once, never blocking the actor. A full or closed channel
//! drops that envelope for that connection only (counted in metrics).

use crate::connection::ConnectionId;
use crate::errors::FabricError;
use crate::messages::{EventEnvelope, RelayMessage, RelayState, RoomInfo};
use crate::metrics::RelayMetrics;
use crate::room::RoomKey;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Mailbox buffer for the relay actor.
const RELAY_CHANNEL_BUFFER: usize = 500;

/// Handle to the `RelayActor`.
///
/// Clone-able; all methods send a command into the actor mailbox and
/// await its acknowledgement, which makes effects observable to the
/// caller in program order.
#[derive(Clone)]
pub struct RelayHandle {
    sender: mpsc::Sender<RelayMessage>,
    cancel_token: CancellationToken,
}

impl RelayHandle {
    /// Lifecycle hook: a new connection opened.
    ///
    /// Registers the connection's outbound channel. Until the
    /// connection joins a room it receives nothing.
    pub async fn on_connect(
        &self,
        connection_id: ConnectionId,
        sender: mpsc::Sender<EventEnvelope>,
    ) -> Result<(), FabricError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RelayMessage::Connect {
                connection_id,
                sender,
                respond_to: tx,
            })
            .await
            .map_err(|e| FabricError::Mailbox(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| FabricError::Mailbox(format!("response receive failed: {e}")))
    }

    /// Lifecycle hook: a connection joins a room. Idempotent.
    pub async fn on_join(
        &self,
        connection_id: ConnectionId,
        room: RoomKey,
    ) -> Result<(), FabricError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RelayMessage::Join {
                connection_id,
                room,
                respond_to: tx,
            })
            .await
            .map_err(|e| FabricError::Mailbox(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| FabricError::Mailbox(format!("response receive failed: {e}")))
    }

    /// Publish an event to every connection currently in `room`.
    ///
    /// Fire-and-forget, at-most-once. Returns the number of connections
    /// the envelope was handed to; zero subscribers is a silent no-op,
    /// not an error.
    pub async fn publish(
        &self,
        room: RoomKey,
        event: impl Into<String>,
        data: serde_json::Value,
    ) -> Result<usize, FabricError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RelayMessage::Publish {
                room,
                envelope: EventEnvelope::new(event, data),
                respond_to: tx,
            })
            .await
            .map_err(|e| FabricError::Mailbox(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| FabricError::Mailbox(format!("response receive failed: {e}")))
    }

    /// Lifecycle hook: a connection closed.
    ///
    /// Removes it from every room it had joined; it receives no further
    /// publishes.
    pub async fn on_disconnect(&self, connection_id: ConnectionId) -> Result<(), FabricError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RelayMessage::Disconnect {
                connection_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| FabricError::Mailbox(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| FabricError::Mailbox(format!("response receive failed: {e}")))
    }

    /// Snapshot of registry state.
    pub async fn state(&self) -> Result<RelayState, FabricError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RelayMessage::GetState { respond_to: tx })
            .await
            .map_err(|e| FabricError::Mailbox(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| FabricError::Mailbox(format!("response receive failed: {e}")))
    }

    /// Cancel the relay actor.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the actor is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// A registered connection's bookkeeping.
struct RegisteredConnection {
    /// Outbound channel toward the transport task.
    sender: mpsc::Sender<EventEnvelope>,
    /// Rooms this connection has joined.
    joined: HashSet<RoomKey>,
}

/// The `RelayActor` implementation.
pub struct RelayActor {
    receiver: mpsc::Receiver<RelayMessage>,
    cancel_token: CancellationToken,
    connections: HashMap<ConnectionId, RegisteredConnection>,
    rooms: HashMap<RoomKey, HashSet<ConnectionId>>,
    metrics: Arc<RelayMetrics>,
}

impl RelayActor {
    /// Spawn the relay actor.
    ///
    /// Returns a handle and the task join handle.
    pub fn spawn(
        cancel_token: CancellationToken,
        metrics: Arc<RelayMetrics>,
    ) -> (RelayHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(RELAY_CHANNEL_BUFFER);

        let actor = Self {
            receiver,
            cancel_token: cancel_token.clone(),
            connections: HashMap::new(),
            rooms: HashMap::new(),
            metrics,
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = RelayHandle {
            sender,
            cancel_token,
        };

        (handle, task_handle)
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "fabric.relay")]
    async fn run(mut self) {
        info!(target: "fabric.relay", "RelayActor started");

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "fabric.relay",
                        connections = self.connections.len(),
                        "RelayActor received cancellation signal"
                    );
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => self.handle_message(message),
                        None => {
                            info!(target: "fabric.relay", "RelayActor channel closed, exiting");
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "fabric.relay",
            connections = self.connections.len(),
            "RelayActor stopped"
        );
    }

    /// Handle a single command.
    fn handle_message(&mut self, message: RelayMessage) {
        match message {
            RelayMessage::Connect {
                connection_id,
                sender,
                respond_to,
            } => {
                self.handle_connect(connection_id, sender);
                let _ = respond_to.send(());
            }

            RelayMessage::Join {
                connection_id,
                room,
                respond_to,
            } => {
                self.handle_join(connection_id, room);
                let _ = respond_to.send(());
            }

            RelayMessage::Publish {
                room,
                envelope,
                respond_to,
            } => {
                let delivered = self.handle_publish(&room, envelope);
                let _ = respond_to.send(delivered);
            }

            RelayMessage::Disconnect {
                connection_id,
                respond_to,
            } => {
                self.handle_disconnect(connection_id);
                let _ = respond_to.send(());
            }

            RelayMessage::GetState { respond_to } => {
                let _ = respond_to.send(self.get_state());
            }
        }
    }

    fn handle_connect(&mut self, connection_id: ConnectionId, sender: mpsc::Sender<EventEnvelope>) {
        debug!(
            target: "fabric.relay",
            connection_id = %connection_id,
            "Connection registered"
        );

        // Re-registering an ID replaces the channel and resets membership.
        if self.connections.contains_key(&connection_id) {
            warn!(
                target: "fabric.relay",
                connection_id = %connection_id,
                "Duplicate connection ID, replacing previous registration"
            );
            self.remove_connection(connection_id);
        }

        self.connections.insert(
            connection_id,
            RegisteredConnection {
                sender,
                joined: HashSet::new(),
            },
        );
        self.metrics.connection_opened();
    }

    fn handle_join(&mut self, connection_id: ConnectionId, room: RoomKey) {
        let Some(connection) = self.connections.get_mut(&connection_id) else {
            warn!(
                target: "fabric.relay",
                connection_id = %connection_id,
                room = %room,
                "Join for unknown connection ignored"
            );
            return;
        };

        // Idempotent: a second join of the same room is a no-op.
        if connection.joined.insert(room.clone()) {
            self.rooms.entry(room.clone()).or_default().insert(connection_id);
            debug!(
                target: "fabric.relay",
                connection_id = %connection_id,
                room = %room,
                "Connection joined room"
            );
        }
    }

    fn handle_publish(&mut self, room: &RoomKey, envelope: EventEnvelope) -> usize {
        let subscribers = match self.rooms.get(room) {
            Some(set) => set,
            // Nobody home: graceful degradation path for offline actors.
            None => {
                self.metrics.record_publish(0, 0);
                debug!(
                    target: "fabric.relay",
                    room = %room,
                    event = %envelope.event,
                    "Publish to empty room"
                );
                return 0;
            }
        };

        let mut delivered = 0;
        let mut dropped = 0;

        for connection_id in subscribers {
            if let Some(connection) = self.connections.get(connection_id) {
                match connection.sender.try_send(envelope.clone()) {
                    Ok(()) => delivered += 1,
                    Err(_) => {
                        // Slow or closing connection; at-most-once means
                        // we drop rather than block the relay.
                        dropped += 1;
                        debug!(
                            target: "fabric.relay",
                            connection_id = %connection_id,
                            room = %room,
                            event = %envelope.event,
                            "Dropped envelope for unresponsive connection"
                        );
                    }
                }
            }
        }

        self.metrics.record_publish(delivered, dropped);
        debug!(
            target: "fabric.relay",
            room = %room,
            event = %envelope.event,
            delivered,
            dropped,
            "Published event"
        );

        delivered
    }

    fn handle_disconnect(&mut self, connection_id: ConnectionId) {
        if self.remove_connection(connection_id) {
            self.metrics.connection_closed();
            debug!(
                target: "fabric.relay",
                connection_id = %connection_id,
                "Connection disconnected"
            );
        }
    }

    /// Remove a connection from the registry and every room it joined.
    fn remove_connection(&mut self, connection_id: ConnectionId) -> bool {
        let Some(connection) = self.connections.remove(&connection_id) else {
            return false;
        };

        for room in &connection.joined {
            if let Some(subscribers) = self.rooms.get_mut(room) {
                subscribers.remove(&connection_id);
                if subscribers.is_empty() {
                    // Rooms exist only while someone is joined.
                    self.rooms.remove(room);
                }
            }
        }

        true
    }

    fn get_state(&self) -> RelayState {
        let mut rooms: Vec<RoomInfo> = self
            .rooms
            .iter()
            .map(|(key, subscribers)| RoomInfo {
                room: key.to_string(),
                subscribers: subscribers.len(),
            })
            .collect();
        rooms.sort_by(|a, b| a.room.cmp(&b.room));

        RelayState {
            connections: self.connections.len(),
            rooms,
        }
    }
}

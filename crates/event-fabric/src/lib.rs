//! Event fabric: actor registry and room-addressed relay.
//!
//! The fabric is the substrate for two things that share one delivery
//! primitive: appointment workflow fan-out and call-signaling relay.
//!
//! A single `RelayActor` owns all room membership state and processes
//! commands from a `tokio::sync::mpsc` mailbox:
//!
//! - connections register an outbound channel on connect
//! - any connection can join named rooms (idempotent)
//! - anyone holding a [`registry::RelayHandle`] can publish an event to
//!   a room; every currently-joined connection receives it
//! - disconnect removes the connection from every room it had joined
//!
//! Delivery is fire-and-forget and at-most-once: publishing to a room
//! with zero subscribers is a silent no-op, and a connection that is
//! not joined at publish time never receives the event. Events
//! published to the same room by the same publisher arrive in publish
//! order because the actor mailbox is FIFO and fan-out is synchronous
//! within the actor.
//!
//! All state is process-local; nothing is persisted or replicated.
//!
//! # Modules
//!
//! - `room` - typed room keys with canonicalized addressing
//! - `connection` - connection identifiers
//! - `messages` - mailbox command and event envelope types
//! - `registry` - the relay actor and its handle
//! - `metrics` - fabric counters

pub mod connection;
pub mod errors;
pub mod messages;
pub mod metrics;
pub mod registry;
pub mod room;

pub use connection::ConnectionId;
pub use errors::FabricError;
pub use messages::EventEnvelope;
pub use metrics::RelayMetrics;
pub use registry::{RelayActor, RelayHandle};
pub use room::RoomKey;

//! Connection identifiers.
//!
//! A connection is ephemeral: the transport layer assigns its ID at
//! connect time and destroys it on disconnect. The relay only ever sees
//! the ID plus an outbound channel; it never owns the socket.

use serde::Serialize;
use uuid::Uuid;

/// Unique identifier for one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

//! Typed room keys.
//!
//! Rooms are not stored entities; a room exists exactly as long as at
//! least one connection has joined it. A `RoomKey` is the deterministic
//! addressing key derived from actor role and identity.
//!
//! Keys are constructed only through the typed constructors so that the
//! canonicalization rules live in one place. Doctor display names are
//! canonicalized case-insensitively with whitespace collapsed, because
//! the stored spelling of a physician's name and the spelling used to
//! address them frequently differ in case.

use serde::Serialize;
use uuid::Uuid;

/// Opaque room addressing key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RoomKey(Inner);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
enum Inner {
    /// A specific patient's room.
    Patient(Uuid),
    /// A specific doctor's room, keyed by canonicalized display name.
    Doctor(String),
    /// The single shared admin room.
    Admins,
}

impl RoomKey {
    /// Room for a specific patient.
    #[must_use]
    pub fn patient(id: Uuid) -> Self {
        Self(Inner::Patient(id))
    }

    /// Room for a specific doctor, addressed by display name.
    ///
    /// The name is canonicalized (trimmed, lowercased, inner whitespace
    /// collapsed), so `"Dr. Lee"` and `" dr.  LEE "` address the same
    /// room.
    #[must_use]
    pub fn doctor(display_name: &str) -> Self {
        Self(Inner::Doctor(canonicalize_doctor_name(display_name)))
    }

    /// The shared admin group room.
    #[must_use]
    pub fn admins() -> Self {
        Self(Inner::Admins)
    }
}

impl std::fmt::Display for RoomKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Inner::Patient(id) => write!(f, "patient:{id}"),
            Inner::Doctor(name) => write!(f, "doctor:{name}"),
            Inner::Admins => write!(f, "admins"),
        }
    }
}

/// Canonical form of a doctor display name used for room addressing
/// and queue lookups.
#[must_use]
pub fn canonicalize_doctor_name(display_name: &str) -> String {
    display_name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

//! Common data types for Ward components.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an appointment aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppointmentId(pub Uuid);

impl AppointmentId {
    /// Create a new random appointment ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AppointmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AppointmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique identifier for a patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatientId(pub Uuid);

impl PatientId {
    /// Create a new random patient ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PatientId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PatientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Role of the actor behind a request or connection.
///
/// Admins act as a single collective group; patients and doctors are
/// individually addressable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    /// A patient, addressed by patient ID.
    Patient,
    /// A physician, addressed by display name.
    Doctor,
    /// The collective admin group.
    Admin,
}

impl ActorRole {
    /// Returns the string representation of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Patient => "patient",
            ActorRole::Doctor => "doctor",
            ActorRole::Admin => "admin",
        }
    }

    /// Parse a role from its string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "patient" => Some(ActorRole::Patient),
            "doctor" => Some(ActorRole::Doctor),
            "admin" => Some(ActorRole::Admin),
            _ => None,
        }
    }
}

/// Resolved actor identity attached to every protected request.
///
/// Produced by the upstream authentication layer; the orchestrator
/// trusts this identity for room addressing and permission checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorIdentity {
    /// The actor's role.
    pub role: ActorRole,
    /// Stable external ID (present for patients and doctors).
    pub actor_id: Option<Uuid>,
    /// Display name (present for doctors; used for room addressing).
    pub display_name: Option<String>,
}

impl ActorIdentity {
    /// Identity for the collective admin group.
    #[must_use]
    pub fn admin() -> Self {
        Self {
            role: ActorRole::Admin,
            actor_id: None,
            display_name: None,
        }
    }

    /// Identity for a specific patient.
    #[must_use]
    pub fn patient(id: Uuid) -> Self {
        Self {
            role: ActorRole::Patient,
            actor_id: Some(id),
            display_name: None,
        }
    }

    /// Identity for a specific doctor, addressed by display name.
    #[must_use]
    pub fn doctor(id: Uuid, display_name: impl Into<String>) -> Self {
        Self {
            role: ActorRole::Doctor,
            actor_id: Some(id),
            display_name: Some(display_name.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_appointment_id_uniqueness() {
        assert_ne!(AppointmentId::new(), AppointmentId::new());
    }

    #[test]
    fn test_role_round_trip() {
        for role in [ActorRole::Patient, ActorRole::Doctor, ActorRole::Admin] {
            assert_eq!(ActorRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(ActorRole::parse("nurse"), None);
    }

    #[test]
    fn test_identity_constructors() {
        let id = Uuid::new_v4();
        let patient = ActorIdentity::patient(id);
        assert_eq!(patient.role, ActorRole::Patient);
        assert_eq!(patient.actor_id, Some(id));
        assert!(patient.display_name.is_none());

        let doctor = ActorIdentity::doctor(id, "Dr. Lee");
        assert_eq!(doctor.display_name.as_deref(), Some("Dr. Lee"));

        let admin = ActorIdentity::admin();
        assert!(admin.actor_id.is_none());
    }
}

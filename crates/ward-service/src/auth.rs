//! Identity middleware for protected routes.
//!
//! Token issuance and verification live in the upstream gateway; by the
//! time a request reaches this service its actor identity has been
//! resolved into trusted headers. The middleware reads those headers,
//! builds an [`ActorIdentity`] and injects it into request extensions.
//!
//! # Headers
//!
//! ```text
//! x-ward-role: patient | doctor | admin
//! x-ward-actor-id: <uuid>          (required for patient and doctor)
//! x-ward-display-name: <string>    (required for doctor)
//! ```

use crate::errors::WardError;
use axum::{extract::Request, middleware::Next, response::IntoResponse};
use common::types::{ActorIdentity, ActorRole};
use tracing::instrument;
use uuid::Uuid;

pub const ROLE_HEADER: &str = "x-ward-role";
pub const ACTOR_ID_HEADER: &str = "x-ward-actor-id";
pub const DISPLAY_NAME_HEADER: &str = "x-ward-display-name";

/// Identity middleware for protected routes.
///
/// - Returns 401 Unauthorized if the role header is missing or malformed
/// - Continues to the next handler with [`ActorIdentity`] in extensions
#[instrument(skip(req, next), name = "ward.middleware.identity")]
pub async fn require_identity(
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, WardError> {
    let identity = identity_from_headers(&req)?;
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

fn identity_from_headers(req: &Request) -> Result<ActorIdentity, WardError> {
    let header_str = |name: &str| -> Option<&str> {
        req.headers().get(name).and_then(|h| h.to_str().ok())
    };

    let role_str = header_str(ROLE_HEADER).ok_or_else(|| {
        tracing::debug!(target: "ward.middleware.identity", "Missing role header");
        WardError::Unauthorized("Missing actor role header".to_string())
    })?;

    let role = ActorRole::parse(role_str).ok_or_else(|| {
        tracing::debug!(target: "ward.middleware.identity", role = %role_str, "Unknown actor role");
        WardError::Unauthorized("Unknown actor role".to_string())
    })?;

    let actor_id = match header_str(ACTOR_ID_HEADER) {
        Some(raw) => Some(Uuid::parse_str(raw).map_err(|_| {
            WardError::Unauthorized("Malformed actor id header".to_string())
        })?),
        None => None,
    };

    let display_name = header_str(DISPLAY_NAME_HEADER).map(str::to_string);

    match role {
        ActorRole::Admin => Ok(ActorIdentity::admin()),
        ActorRole::Patient => {
            let id = actor_id.ok_or_else(|| {
                WardError::Unauthorized("Patient identity requires an actor id".to_string())
            })?;
            Ok(ActorIdentity::patient(id))
        }
        ActorRole::Doctor => {
            let id = actor_id.ok_or_else(|| {
                WardError::Unauthorized("Doctor identity requires an actor id".to_string())
            })?;
            let name = display_name.ok_or_else(|| {
                // Room addressing for doctors is keyed by display name.
                WardError::Unauthorized("Doctor identity requires a display name".to_string())
            })?;
            Ok(ActorIdentity::doctor(id, name))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;

    fn request_with_headers(headers: &[(&str, &str)]) -> Request {
        let mut builder = HttpRequest::builder().uri("/v1/appointments");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_admin_identity() {
        let req = request_with_headers(&[(ROLE_HEADER, "admin")]);
        let identity = identity_from_headers(&req).unwrap();
        assert_eq!(identity.role, ActorRole::Admin);
        assert!(identity.actor_id.is_none());
    }

    #[test]
    fn test_patient_identity_requires_id() {
        let req = request_with_headers(&[(ROLE_HEADER, "patient")]);
        let result = identity_from_headers(&req);
        assert!(matches!(result, Err(WardError::Unauthorized(_))));

        let id = Uuid::new_v4();
        let req = request_with_headers(&[
            (ROLE_HEADER, "patient"),
            (ACTOR_ID_HEADER, &id.to_string()),
        ]);
        let identity = identity_from_headers(&req).unwrap();
        assert_eq!(identity.role, ActorRole::Patient);
        assert_eq!(identity.actor_id, Some(id));
    }

    #[test]
    fn test_doctor_identity_requires_display_name() {
        let id = Uuid::new_v4();
        let req = request_with_headers(&[
            (ROLE_HEADER, "doctor"),
            (ACTOR_ID_HEADER, &id.to_string()),
        ]);
        assert!(matches!(
            identity_from_headers(&req),
            Err(WardError::Unauthorized(_))
        ));

        let req = request_with_headers(&[
            (ROLE_HEADER, "doctor"),
            (ACTOR_ID_HEADER, &id.to_string()),
            (DISPLAY_NAME_HEADER, "Dr. Lee"),
        ]);
        let identity = identity_from_headers(&req).unwrap();
        assert_eq!(identity.role, ActorRole::Doctor);
        assert_eq!(identity.display_name.as_deref(), Some("Dr. Lee"));
    }

    #[test]
    fn test_unknown_role_rejected() {
        let req = request_with_headers(&[(ROLE_HEADER, "superuser")]);
        assert!(matches!(
            identity_from_headers(&req),
            Err(WardError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_malformed_actor_id_rejected() {
        let req = request_with_headers(&[
            (ROLE_HEADER, "patient"),
            (ACTOR_ID_HEADER, "not-a-uuid"),
        ]);
        assert!(matches!(
            identity_from_headers(&req),
            Err(WardError::Unauthorized(_))
        ));
    }
}

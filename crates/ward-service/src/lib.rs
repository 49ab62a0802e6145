//! Ward Service Library
//!
//! Core functionality for the Ward hospital operations platform:
//!
//! - Appointment workflow orchestration (multi-actor state machine)
//! - Per-doctor, per-day consultation queue with call-next semantics
//! - Notification fan-out over the event fabric, with SMS fallback
//! - Call-signaling relay for peer-to-peer media negotiation
//!
//! # Architecture
//!
//! The service follows the Handler -> Service -> Repository pattern:
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/*.rs -> repositories/*.rs
//! ```
//!
//! Real-time delivery goes through the `event-fabric` relay; a handle
//! is injected into the application state so tests can swap in a
//! private relay with channel-backed connections.
//!
//! # Modules
//!
//! - `config` - service configuration from environment
//! - `errors` - error types with HTTP status code mapping
//! - `auth` - resolved actor identity and the auth middleware
//! - `models` - appointment aggregate, enums and API models
//! - `repositories` - record store interface and Postgres implementation
//! - `services` - state machine, queue, dispatcher, payments, SMS
//! - `handlers` - HTTP request handlers
//! - `routes` - Axum router setup
//! - `observability` - metrics

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;

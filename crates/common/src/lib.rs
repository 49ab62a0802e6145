//! Shared types for Ward components.
//!
//! This crate carries the small set of types used by more than one
//! workspace member:
//!
//! - `types` - newtype identifiers and the resolved actor identity
//! - `secret` - secret-handling re-exports for sensitive values

pub mod secret;
pub mod types;

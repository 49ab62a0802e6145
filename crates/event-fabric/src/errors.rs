//! Event fabric error types.

use thiserror::Error;

/// Errors surfaced by the relay handle.
///
/// The relay itself performs no delivery error handling: a publish to an
/// empty room succeeds and delivers nothing. The only failure mode a
/// caller can observe is the relay actor being gone (mailbox closed
/// during shutdown).
#[derive(Debug, Error)]
pub enum FabricError {
    #[error("relay mailbox unavailable: {0}")]
    Mailbox(String),
}

//! HTTP request handlers for the ward service.

pub mod appointments;
pub mod calls;
pub mod events;
pub mod health;
pub mod metrics;
pub mod queue;

pub use health::health_check;
pub use metrics::metrics_handler;

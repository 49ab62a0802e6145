//! Business logic services.
//!
//! Services sit between handlers and the record store. The appointment
//! service owns the lifecycle state machine, the queue service owns
//! call-next, the dispatcher maps committed transitions to relay rooms
//! and the SMS fallback, and signaling ferries call-setup payloads.

pub mod appointments;
pub mod notifications;
pub mod payments;
pub mod queue;
pub mod signaling;
pub mod sms;

pub use appointments::AppointmentService;
pub use notifications::{Dispatcher, Transition};
pub use payments::{HmacPaymentVerifier, PaymentVerifier};
pub use queue::QueueService;
pub use signaling::SignalingService;
pub use sms::{DisabledSmsChannel, HttpSmsChannel, SmsChannel, SmsError};

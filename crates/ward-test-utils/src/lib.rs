//! # Ward Test Utilities
//!
//! Shared test utilities for the ward service:
//!
//! - `MemoryRecordStore` - in-memory [`RecordStore`] with the same
//!   conditional-update semantics as the Postgres implementation
//! - `RecordingSmsChannel` / `FailingSmsChannel` - SMS channel fakes
//! - `TestWard` - fully wired service harness on a private relay
//!
//! [`RecordStore`]: ward_service::repositories::RecordStore

pub mod fake_sms;
pub mod harness;
pub mod memory_store;

pub use fake_sms::{FailingSmsChannel, RecordingSmsChannel, SentSms};
pub use harness::{sign_payment, TestWard};
pub use memory_store::MemoryRecordStore;

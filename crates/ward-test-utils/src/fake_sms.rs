//! SMS channel fakes.
//!
//! The dispatcher sends SMS from a spawned task, so the recording fake
//! hands deliveries to the test over a channel the test can await
//! instead of a snapshot it would have to poll.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use ward_service::services::{SmsChannel, SmsError};

/// One delivery captured by [`RecordingSmsChannel`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentSms {
    pub phone_number: String,
    pub template: String,
    pub data: Value,
}

/// Records every send and reports success.
pub struct RecordingSmsChannel {
    tx: mpsc::UnboundedSender<SentSms>,
}

impl RecordingSmsChannel {
    /// Returns the channel and the receiver tests await deliveries on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SentSms>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl SmsChannel for RecordingSmsChannel {
    async fn send(&self, phone_number: &str, template: &str, data: &Value) -> Result<(), SmsError> {
        // Receiver dropped means the test no longer cares; still
        // report success so the dispatcher path stays exercised.
        let _ = self.tx.send(SentSms {
            phone_number: phone_number.to_string(),
            template: template.to_string(),
            data: data.clone(),
        });
        Ok(())
    }
}

/// Fails every send with a gateway error.
pub struct FailingSmsChannel;

#[async_trait]
impl SmsChannel for FailingSmsChannel {
    async fn send(&self, _phone: &str, _template: &str, _data: &Value) -> Result<(), SmsError> {
        Err(SmsError::Gateway("injected gateway failure".to_string()))
    }
}

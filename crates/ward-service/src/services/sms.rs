//! Durable SMS fallback channel.
//!
//! Used for transitions that must reach a patient even when no live
//! connection exists. Delivery is best effort: failures are logged by
//! the dispatcher and never propagate into the triggering request.

use async_trait::async_trait;
use common::secret::{ExposeSecret, SecretString};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SmsError {
    /// The gateway rejected the request or was unreachable.
    #[error("SMS gateway error: {0}")]
    Gateway(String),

    /// No gateway is configured for this deployment.
    #[error("SMS channel is not configured")]
    Disabled,
}

/// Durable notification channel collaborator.
#[async_trait]
pub trait SmsChannel: Send + Sync {
    async fn send(
        &self,
        phone_number: &str,
        template: &str,
        data: &Value,
    ) -> Result<(), SmsError>;
}

/// HTTP client for the SMS gateway.
pub struct HttpSmsChannel {
    client: reqwest::Client,
    gateway_url: String,
    api_key: Option<SecretString>,
}

impl HttpSmsChannel {
    pub fn new(gateway_url: String, api_key: Option<SecretString>) -> Self {
        Self {
            client: reqwest::Client::new(),
            gateway_url,
            api_key,
        }
    }
}

#[async_trait]
impl SmsChannel for HttpSmsChannel {
    async fn send(
        &self,
        phone_number: &str,
        template: &str,
        data: &Value,
    ) -> Result<(), SmsError> {
        let body = serde_json::json!({
            "to": phone_number,
            "template": template,
            "data": data,
        });

        let mut request = self.client.post(&self.gateway_url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| SmsError::Gateway(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SmsError::Gateway(format!(
                "gateway returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Channel used when no gateway is configured.
pub struct DisabledSmsChannel;

#[async_trait]
impl SmsChannel for DisabledSmsChannel {
    async fn send(&self, _phone: &str, _template: &str, _data: &Value) -> Result<(), SmsError> {
        Err(SmsError::Disabled)
    }
}

//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports from the [`secrecy`] crate. Use these types for all
//! sensitive values: signing keys, gateway API keys, connection strings
//! embedded in config structs.
//!
//! `SecretString` implements `Debug` with redaction, so any struct that
//! derives `Debug` while holding one cannot leak the value through `{:?}`
//! or tracing fields. Values are zeroized on drop. Access requires an
//! explicit `expose_secret()` call.
//!
//! # Ward usage
//!
//! - `PAYMENT_SIGNING_KEY` - HMAC key for payment signature verification
//! - `SMS_API_KEY` - SMS gateway credential

pub use secrecy::{ExposeSecret, SecretBox, SecretString};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretString::from("hunter2");
        let debug_str = format!("{secret:?}");
        assert!(!debug_str.contains("hunter2"));
    }

    #[test]
    fn test_expose_secret_returns_value() {
        let secret = SecretString::from("hunter2");
        assert_eq!(secret.expose_secret(), "hunter2");
    }

    #[test]
    fn test_deserialize_from_json() {
        use serde::Deserialize;

        #[derive(Debug, Deserialize)]
        struct GatewayCredentials {
            endpoint: String,
            api_key: SecretString,
        }

        let json = r#"{"endpoint": "https://sms.example.com", "api_key": "k-123"}"#;
        let creds: GatewayCredentials = serde_json::from_str(json).unwrap();

        assert_eq!(creds.endpoint, "https://sms.example.com");
        assert_eq!(creds.api_key.expose_secret(), "k-123");
        assert!(!format!("{creds:?}").contains("k-123"));
    }
}

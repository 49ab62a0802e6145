//! Ward service configuration.
//!
//! Configuration is loaded from environment variables. All sensitive
//! fields are held as secrets and redacted in Debug output.

use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default per-connection outbound event buffer.
pub const DEFAULT_CONNECTION_BUFFER: usize = 64;

/// Default ward instance ID prefix.
pub const DEFAULT_WARD_ID_PREFIX: &str = "ward";

/// Ward service configuration.
///
/// Loaded from environment variables with sensible defaults. The
/// database URL and signing key are redacted in Debug output.
#[derive(Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// HMAC key for payment signature verification.
    pub payment_signing_key: SecretString,

    /// SMS gateway endpoint. SMS fallback is disabled when absent.
    pub sms_gateway_url: Option<String>,

    /// SMS gateway credential.
    pub sms_api_key: Option<SecretString>,

    /// Outbound event buffer per live connection.
    pub connection_buffer: usize,

    /// Unique identifier for this ward instance.
    pub ward_id: String,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("payment_signing_key", &"[REDACTED]")
            .field("sms_gateway_url", &self.sms_gateway_url)
            .field(
                "sms_api_key",
                &self.sms_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("connection_buffer", &self.connection_buffer)
            .field("ward_id", &self.ward_id)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid connection buffer configuration: {0}")]
    InvalidConnectionBuffer(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = vars
            .get("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?
            .clone();

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| "0.0.0.0:8080".to_string());

        let payment_signing_key = vars
            .get("PAYMENT_SIGNING_KEY")
            .ok_or_else(|| ConfigError::MissingEnvVar("PAYMENT_SIGNING_KEY".to_string()))
            .map(|v| SecretString::from(v.clone()))?;

        let sms_gateway_url = vars.get("SMS_GATEWAY_URL").cloned();
        let sms_api_key = vars
            .get("SMS_API_KEY")
            .map(|v| SecretString::from(v.clone()));

        // Parse connection buffer with validation
        let connection_buffer = if let Some(value_str) = vars.get("CONNECTION_BUFFER") {
            let value: usize = value_str.parse().map_err(|e| {
                ConfigError::InvalidConnectionBuffer(format!(
                    "CONNECTION_BUFFER must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidConnectionBuffer(
                    "CONNECTION_BUFFER must be greater than 0".to_string(),
                ));
            }

            value
        } else {
            DEFAULT_CONNECTION_BUFFER
        };

        // Generate ward instance ID
        let ward_id = vars.get("WARD_ID").cloned().unwrap_or_else(|| {
            let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
            format!("{}-{}-{}", DEFAULT_WARD_ID_PREFIX, hostname, short_suffix)
        });

        Ok(Config {
            database_url,
            bind_address,
            payment_signing_key,
            sms_gateway_url,
            sms_api_key,
            connection_buffer,
            ward_id,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([
            (
                "DATABASE_URL".to_string(),
                "postgresql://localhost/ward_test".to_string(),
            ),
            ("PAYMENT_SIGNING_KEY".to_string(), "test-key".to_string()),
        ])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let vars = base_vars();

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.database_url, "postgresql://localhost/ward_test");
        assert_eq!(config.bind_address, "0.0.0.0:8080");
        assert!(config.sms_gateway_url.is_none());
        assert!(config.sms_api_key.is_none());
        assert_eq!(config.connection_buffer, DEFAULT_CONNECTION_BUFFER);
        // Ward ID should be auto-generated
        assert!(config.ward_id.starts_with("ward-"));
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let mut vars = base_vars();
        vars.insert("BIND_ADDRESS".to_string(), "127.0.0.1:9000".to_string());
        vars.insert(
            "SMS_GATEWAY_URL".to_string(),
            "https://sms.example.com/v1/send".to_string(),
        );
        vars.insert("SMS_API_KEY".to_string(), "sms-secret".to_string());
        vars.insert("CONNECTION_BUFFER".to_string(), "128".to_string());
        vars.insert("WARD_ID".to_string(), "ward-custom-001".to_string());

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(
            config.sms_gateway_url.as_deref(),
            Some("https://sms.example.com/v1/send")
        );
        assert!(config.sms_api_key.is_some());
        assert_eq!(config.connection_buffer, 128);
        assert_eq!(config.ward_id, "ward-custom-001");
    }

    #[test]
    fn test_from_vars_missing_database_url() {
        let mut vars = base_vars();
        vars.remove("DATABASE_URL");

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "DATABASE_URL"));
    }

    #[test]
    fn test_from_vars_missing_signing_key() {
        let mut vars = base_vars();
        vars.remove("PAYMENT_SIGNING_KEY");

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "PAYMENT_SIGNING_KEY")
        );
    }

    #[test]
    fn test_connection_buffer_rejects_zero() {
        let mut vars = base_vars();
        vars.insert("CONNECTION_BUFFER".to_string(), "0".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidConnectionBuffer(msg)) if msg.contains("greater than 0"))
        );
    }

    #[test]
    fn test_connection_buffer_rejects_non_numeric() {
        let mut vars = base_vars();
        vars.insert("CONNECTION_BUFFER".to_string(), "many".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidConnectionBuffer(msg)) if msg.contains("valid positive integer"))
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut vars = base_vars();
        vars.insert("SMS_API_KEY".to_string(), "sms-secret".to_string());
        let config = Config::from_vars(&vars).expect("Config should load successfully");

        let debug_output = format!("{:?}", config);

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("postgresql://"));
        assert!(!debug_output.contains("test-key"));
        assert!(!debug_output.contains("sms-secret"));
    }
}

//! Payment signature verification.
//!
//! Order creation and capture happen at the payment gateway; this
//! service only checks that a recorded payment really came from the
//! gateway, by recomputing the keyed hash of `order_id|payment_id`
//! and comparing it to the signature the client relayed.

use common::secret::{ExposeSecret, SecretString};
use ring::hmac;

/// Verifies payment gateway signatures.
pub trait PaymentVerifier: Send + Sync {
    /// Returns true when `signature` is a valid hex-encoded HMAC over
    /// `order_id|payment_id` under the shared gateway key.
    fn verify(&self, order_id: &str, payment_id: &str, signature: &str) -> bool;
}

/// HMAC-SHA256 verifier using the configured gateway signing key.
pub struct HmacPaymentVerifier {
    key: hmac::Key,
}

impl HmacPaymentVerifier {
    pub fn new(signing_key: &SecretString) -> Self {
        let key = hmac::Key::new(hmac::HMAC_SHA256, signing_key.expose_secret().as_bytes());
        Self { key }
    }
}

impl PaymentVerifier for HmacPaymentVerifier {
    fn verify(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        let Ok(provided) = hex::decode(signature) else {
            return false;
        };
        let message = format!("{order_id}|{payment_id}");
        // ring's verify is constant-time over the tag comparison.
        hmac::verify(&self.key, message.as_bytes(), &provided).is_ok()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sign(key: &str, order_id: &str, payment_id: &str) -> String {
        let key = hmac::Key::new(hmac::HMAC_SHA256, key.as_bytes());
        let tag = hmac::sign(&key, format!("{order_id}|{payment_id}").as_bytes());
        hex::encode(tag.as_ref())
    }

    fn verifier(key: &str) -> HmacPaymentVerifier {
        HmacPaymentVerifier::new(&SecretString::from(key.to_string()))
    }

    #[test]
    fn test_valid_signature_accepted() {
        let v = verifier("gateway-key");
        let sig = sign("gateway-key", "order_1", "pay_1");
        assert!(v.verify("order_1", "pay_1", &sig));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let v = verifier("gateway-key");
        let sig = sign("other-key", "order_1", "pay_1");
        assert!(!v.verify("order_1", "pay_1", &sig));
    }

    #[test]
    fn test_tampered_ids_rejected() {
        let v = verifier("gateway-key");
        let sig = sign("gateway-key", "order_1", "pay_1");
        assert!(!v.verify("order_1", "pay_2", &sig));
        assert!(!v.verify("order_2", "pay_1", &sig));
    }

    #[test]
    fn test_non_hex_signature_rejected() {
        let v = verifier("gateway-key");
        assert!(!v.verify("order_1", "pay_1", "not hex at all"));
        assert!(!v.verify("order_1", "pay_1", ""));
    }
}

//! HMAC signing for gateway callbacks and webhooks
//!
//! Two independent secrets are in play. The callback secret covers the
//! client-relayed callback, signed over the canonical
//! `"{gateway_order_ref}|{gateway_payment_ref}"` message. The webhook secret
//! covers the raw webhook body bytes. Signatures travel as lowercase hex
//! HMAC-SHA256 tags.

use ring::hmac;

/// HMAC-SHA256 key that produces and checks hex-encoded signatures.
#[derive(Clone)]
pub struct SignatureKey {
    key: hmac::Key,
}

impl SignatureKey {
    pub fn new(secret: &str) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes()),
        }
    }

    /// Sign a message, returning the tag as lowercase hex.
    pub fn sign(&self, message: &[u8]) -> String {
        hex::encode(hmac::sign(&self.key, message).as_ref())
    }

    /// Verify a hex signature against a message in constant time.
    /// Malformed hex simply fails verification.
    pub fn verify(&self, message: &[u8], signature_hex: &str) -> bool {
        let Ok(signature) = hex::decode(signature_hex) else {
            return false;
        };
        hmac::verify(&self.key, message, &signature).is_ok()
    }
}

/// Canonical message covered by a payment callback signature.
pub fn callback_message(gateway_order_ref: &str, gateway_payment_ref: &str) -> String {
    format!("{}|{}", gateway_order_ref, gateway_payment_ref)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify_roundtrip() {
        let key = SignatureKey::new("secret-a");
        let message = callback_message("gw_order_1", "gw_pay_1");
        let signature = key.sign(message.as_bytes());
        assert!(key.verify(message.as_bytes(), &signature));
    }

    #[test]
    fn test_signature_is_hex_sha256() {
        let key = SignatureKey::new("secret-a");
        let signature = key.sign(b"payload");
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_tampered_message_fails() {
        let key = SignatureKey::new("secret-a");
        let signature = key.sign(b"gw_order_1|gw_pay_1");
        assert!(!key.verify(b"gw_order_1|gw_pay_2", &signature));
    }

    #[test]
    fn test_wrong_key_fails() {
        let signer = SignatureKey::new("secret-a");
        let verifier = SignatureKey::new("secret-b");
        let signature = signer.sign(b"payload");
        assert!(!verifier.verify(b"payload", &signature));
    }

    #[test]
    fn test_malformed_hex_fails() {
        let key = SignatureKey::new("secret-a");
        assert!(!key.verify(b"payload", "not hex at all"));
        assert!(!key.verify(b"payload", ""));
        assert!(!key.verify(b"payload", "abc"));
    }
}

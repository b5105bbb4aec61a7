//! Payment webhook signatures.
//!
//! The provider signs the raw request body with HMAC-SHA256 under the shared
//! webhook secret and sends the hex digest in [`SIGNATURE_HEADER`].

use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

const SCHEME_PREFIX: &str = "sha256=";

/// Why a webhook signature was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureError {
    Missing,
    Malformed,
    Mismatch,
}

impl SignatureError {
    pub fn message(self) -> &'static str {
        match self {
            SignatureError::Missing => "webhook signature header is missing",
            SignatureError::Malformed => "webhook signature is not a hex digest",
            SignatureError::Mismatch => "webhook signature does not match the body",
        }
    }
}

/// Signs and verifies webhook bodies with one shared secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    keyed: HmacSha256,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier").finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    pub fn new(secret: &[u8]) -> Result<Self, InvalidLength> {
        Ok(Self {
            keyed: HmacSha256::new_from_slice(secret)?,
        })
    }

    /// Header value for `body`, as the provider would send it.
    pub fn sign(&self, body: &[u8]) -> String {
        let mut mac = self.keyed.clone();
        mac.update(body);
        format!("{SCHEME_PREFIX}{}", hex::encode(mac.finalize().into_bytes()))
    }

    /// Checks `header` against `body` in constant time.
    pub fn verify(&self, body: &[u8], header: Option<&str>) -> Result<(), SignatureError> {
        let header = header.ok_or(SignatureError::Missing)?.trim();
        let digest = header.strip_prefix(SCHEME_PREFIX).unwrap_or(header);
        let expected = hex::decode(digest).map_err(|_| SignatureError::Malformed)?;

        let mut mac = self.keyed.clone();
        mac.update(body);
        mac.verify_slice(&expected)
            .map_err(|_| SignatureError::Mismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_body_verifies() {
        let verifier = WebhookVerifier::new(b"whsec_test").unwrap();
        let body = br#"{"type":"payment_intent.succeeded","intentId":"pi_000001"}"#;

        let header = verifier.sign(body);
        assert!(header.starts_with("sha256="));
        assert_eq!(verifier.verify(body, Some(&header)), Ok(()));
        assert_eq!(
            verifier.verify(body, header.strip_prefix("sha256=")),
            Ok(())
        );
    }

    #[test]
    fn test_rejections() {
        let verifier = WebhookVerifier::new(b"whsec_test").unwrap();
        let body = b"{}";

        assert_eq!(verifier.verify(body, None), Err(SignatureError::Missing));
        assert_eq!(
            verifier.verify(body, Some("sha256=not-hex")),
            Err(SignatureError::Malformed)
        );

        let tampered = verifier.sign(b"{\"x\":1}");
        assert_eq!(
            verifier.verify(body, Some(&tampered)),
            Err(SignatureError::Mismatch)
        );

        let other = WebhookVerifier::new(b"whsec_other").unwrap().sign(body);
        assert_eq!(
            verifier.verify(body, Some(&other)),
            Err(SignatureError::Mismatch)
        );
    }
}

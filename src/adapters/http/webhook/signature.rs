//! Webhook signature verification.
//!
//! The transport signs the raw request body with HMAC-SHA256 using a shared
//! secret and sends the hex digest in the `X-Signature` header. A `sha256=`
//! prefix on the header value is accepted.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "x-signature";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("missing X-Signature header")]
    Missing,

    #[error("X-Signature is not valid hex")]
    Malformed,

    #[error("signature does not match request body")]
    Mismatch,

    #[error("signing key rejected")]
    InvalidKey,
}

/// Verifies `X-Signature` headers against a shared secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Vec<u8>,
}

impl SignatureVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    /// Checks `header` against the HMAC of `payload`.
    pub fn verify(&self, payload: &[u8], header: Option<&str>) -> Result<(), SignatureError> {
        let header = header
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or(SignatureError::Missing)?;
        let hex_digest = header.strip_prefix("sha256=").unwrap_or(header);
        let provided = hex::decode(hex_digest).map_err(|_| SignatureError::Malformed)?;

        let expected = self.digest(payload)?;
        if expected.len() == provided.len() && bool::from(expected.ct_eq(&provided)) {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }

    /// Hex signature for `payload`, as the transport would send it.
    pub fn sign(&self, payload: &[u8]) -> Result<String, SignatureError> {
        Ok(hex::encode(self.digest(payload)?))
    }

    fn digest(&self, payload: &[u8]) -> Result<Vec<u8>, SignatureError> {
        let mut mac =
            Hmac::<Sha256>::new_from_slice(&self.secret).map_err(|_| SignatureError::InvalidKey)?;
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

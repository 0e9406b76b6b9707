//! HMAC-SHA256 Callback Signatures
//!
//! Verifies that completion callbacks were produced by the automation engine.
//! The MAC is computed over the exact bytes received, before any parsing.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{RelayError, RelayResult};

type HmacSha256 = Hmac<Sha256>;

/// Sign a payload with HMAC-SHA256 and return the lowercase hex signature.
pub fn sign_payload(secret: &str, payload: &[u8]) -> RelayResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| RelayError::Authentication)?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify an HMAC-SHA256 signature against the raw payload bytes.
///
/// The presented signature is trimmed of surrounding whitespace. Every
/// mismatch, including a length mismatch, yields the same error.
pub fn verify(payload: &[u8], signature: &str, secret: &str) -> RelayResult<()> {
    let expected = sign_payload(secret, payload)?;
    let presented = signature.trim();

    if bool::from(expected.as_bytes().ct_eq(presented.as_bytes())) {
        Ok(())
    } else {
        Err(RelayError::Authentication)
    }
}

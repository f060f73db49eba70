//! Webhook signature verification (HMAC-SHA256).
//!
//! Synchronous webhook deliveries must pass this gate before their payload
//! reaches the mapping/evaluation path. Verification fails closed: a
//! missing or blank signature or secret yields `false`, never an error.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Conventional scheme prefix on signature header values.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Default name of the signature header.
pub const DEFAULT_SIGNATURE_HEADER: &str = "X-Signature";

/// Compute the hex-encoded HMAC-SHA256 signature of a payload.
///
/// Used when signing outbound test deliveries and by [`verify`] callers in
/// tests; the inbound path only compares.
pub fn compute_signature(secret: &str, payload: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a webhook payload against the supplied signature header value.
///
/// Strips an optional `sha256=` prefix, hex-decodes the remainder, and
/// compares against the expected HMAC-SHA256 digest in constant time.
/// Returns `false` for blank inputs or malformed hex; never panics or
/// errors.
pub fn verify(payload: &[u8], signature_header: &str, secret: &str) -> bool {
    let signature = signature_header.trim();
    if signature.is_empty() || secret.trim().is_empty() {
        return false;
    }

    let signature = signature
        .strip_prefix(SIGNATURE_PREFIX)
        .unwrap_or(signature);

    let Some(signature_bytes) = hex::decode(signature) else {
        return false;
    };

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload);
    // verify_slice performs a constant-time comparison.
    mac.verify_slice(&signature_bytes).is_ok()
}

// ---------------------------------------------------------------------------
// hex helpers (no extra dep)
// ---------------------------------------------------------------------------

mod hex {
    /// Encode bytes as a lowercase hex string.
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Decode a hex string; `None` on odd length or non-hex characters.
    pub fn decode(s: &str) -> Option<Vec<u8>> {
        if s.len() % 2 != 0 {
            return None;
        }
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "wh_secret_123";
    const PAYLOAD: &[u8] = br#"{"policyRef":"pol-12345"}"#;

    #[test]
    fn valid_signature_verifies() {
        let sig = compute_signature(SECRET, PAYLOAD);
        assert!(verify(PAYLOAD, &sig, SECRET));
    }

    #[test]
    fn prefixed_signature_verifies() {
        let sig = format!("sha256={}", compute_signature(SECRET, PAYLOAD));
        assert!(verify(PAYLOAD, &sig, SECRET));
    }

    #[test]
    fn single_byte_payload_change_fails() {
        let sig = compute_signature(SECRET, PAYLOAD);
        let mut tampered = PAYLOAD.to_vec();
        tampered[0] ^= 0x01;
        assert!(!verify(&tampered, &sig, SECRET));
    }

    #[test]
    fn wrong_secret_fails() {
        let sig = compute_signature(SECRET, PAYLOAD);
        assert!(!verify(PAYLOAD, &sig, "other_secret"));
    }

    #[test]
    fn blank_signature_or_secret_fails_closed() {
        let sig = compute_signature(SECRET, PAYLOAD);
        assert!(!verify(PAYLOAD, "", SECRET));
        assert!(!verify(PAYLOAD, "   ", SECRET));
        assert!(!verify(PAYLOAD, &sig, ""));
        assert!(!verify(PAYLOAD, &sig, "  "));
    }

    #[test]
    fn malformed_hex_fails_closed() {
        assert!(!verify(PAYLOAD, "not-hex-at-all", SECRET));
        assert!(!verify(PAYLOAD, "abc", SECRET));
        assert!(!verify(PAYLOAD, "sha256=zzzz", SECRET));
    }

    #[test]
    fn signature_is_hex_sha256() {
        let sig = compute_signature(SECRET, PAYLOAD);
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn hex_round_trip() {
        let bytes = [0x00, 0x7f, 0xff];
        assert_eq!(hex::decode(&hex::encode(bytes)).unwrap(), bytes);
        assert!(hex::decode("0").is_none());
        assert!(hex::decode("zz").is_none());
    }
}

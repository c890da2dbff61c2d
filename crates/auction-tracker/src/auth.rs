//! Request authentication: a static shared token gates every command,
//! with an optional HMAC-SHA256 signed-request envelope as a second
//! factor on sensitive endpoints. Signing follows the usual construction
//! for signed API clients — canonicalize fields, HMAC over them, compare
//! constant-time.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

/// Signed-request envelopes older or newer than this are rejected, bounding
/// replay exposure to a 5-minute timestamp window.
pub const SIGNATURE_WINDOW_SECS: i64 = 5 * 60;

/// Compare a caller-presented token against the configured shared token in
/// constant time, so response latency cannot leak how many leading bytes
/// matched.
pub fn check_token(presented: &str, configured: &str) -> bool {
    if presented.len() != configured.len() {
        return false;
    }
    presented
        .bytes()
        .zip(configured.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

pub fn extract_bearer(header_value: Option<&str>) -> Option<&str> {
    header_value?.strip_prefix("Bearer ").or(header_value)
}

pub fn authenticate(presented: Option<&str>, configured: &str) -> AppResult<()> {
    match presented {
        Some(token) if check_token(token, configured) => Ok(()),
        _ => Err(AppError::Auth("missing or invalid token".into())),
    }
}

/// Canonicalize the fields of a signed request into the exact byte string
/// the HMAC covers: `method\npath\ntimestamp\nbody`.
pub fn canonical_message(method: &str, path: &str, timestamp: i64, body: &str) -> String {
    format!("{method}\n{path}\n{timestamp}\n{body}")
}

pub fn sign(secret: &str, message: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key size");
    mac.update(message.as_bytes());
    hex_encode(&mac.finalize().into_bytes())
}

/// Verify a signed-request envelope: the signature must match and the
/// timestamp must fall inside [`SIGNATURE_WINDOW_SECS`] of `now`.
pub fn verify_signature(
    secret: &str,
    method: &str,
    path: &str,
    timestamp: i64,
    body: &str,
    now: i64,
    presented_signature: &str,
) -> AppResult<()> {
    if (now - timestamp).abs() > SIGNATURE_WINDOW_SECS {
        return Err(AppError::Auth("signed request timestamp out of window".into()));
    }
    let expected = sign(secret, &canonical_message(method, path, timestamp, body));
    if check_token(presented_signature, &expected) {
        Ok(())
    } else {
        Err(AppError::Auth("invalid request signature".into()))
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_check_matches_equal_strings() {
        assert!(check_token("secret-token", "secret-token"));
    }

    #[test]
    fn token_check_rejects_mismatch_or_length_difference() {
        assert!(!check_token("secret-toke", "secret-token"));
        assert!(!check_token("wrong-token!", "secret-token"));
    }

    #[test]
    fn authenticate_requires_presented_token() {
        assert!(authenticate(None, "t").is_err());
        assert!(authenticate(Some("t"), "t").is_ok());
    }

    #[test]
    fn extract_bearer_strips_prefix_or_passes_through() {
        assert_eq!(extract_bearer(Some("Bearer abc")), Some("abc"));
        assert_eq!(extract_bearer(Some("abc")), Some("abc"));
        assert_eq!(extract_bearer(None), None);
    }

    #[test]
    fn signature_round_trips() {
        let secret = "signing-secret";
        let message = canonical_message("POST", "/api/auctions/123/bid", 1_000, "{}");
        let signature = sign(secret, &message);
        assert!(verify_signature(
            secret, "POST", "/api/auctions/123/bid", 1_000, "{}", 1_010, &signature
        )
        .is_ok());
    }

    #[test]
    fn signature_rejects_stale_timestamp() {
        let secret = "signing-secret";
        let message = canonical_message("POST", "/api/auctions/123/bid", 1_000, "{}");
        let signature = sign(secret, &message);
        let stale_now = 1_000 + SIGNATURE_WINDOW_SECS + 1;
        assert!(verify_signature(
            secret, "POST", "/api/auctions/123/bid", 1_000, "{}", stale_now, &signature
        )
        .is_err());
    }
}

//! Stripe webhook signature verification.
//!
//! Stripe signs webhook requests using HMAC-SHA256.
//! Reference: https://docs.stripe.com/webhooks#verify-manually
//!
//! The `Stripe-Signature` header looks like:
//!
//! ```text
//! t=1492774577,v1=5257a869e7ecebeda32affa62cdca3fa51cad7e77a0e56ff536d0ce8e108d8bd,v0=...
//! ```
//!
//! The signed payload is `"{t}.{raw body}"`. More than one `v1` entry may be
//! present while a secret is being rolled; any match is accepted.

use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature, as sent by Stripe.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Only `v1` signatures are trusted. `v0` is test-mode legacy.
const EXPECTED_SCHEME: &str = "v1";

/// Reasons a webhook payload fails verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("No stripe-signature header value was provided.")]
    MissingHeader,

    #[error("Unable to extract timestamp and signatures from header")]
    MalformedHeader,

    #[error("No signatures found matching the expected signature for payload")]
    NoMatch,

    #[error("Timestamp outside the tolerance zone ({age_secs}s old)")]
    Stale { age_secs: i64 },

    #[error("Webhook signing secret is invalid")]
    InvalidSecret,
}

/// Parsed `Stripe-Signature` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Unix seconds the provider signed the payload at
    pub timestamp: i64,
    /// Decoded `v1` digests
    pub signatures: Vec<Vec<u8>>,
}

/// Parse a `Stripe-Signature` header value.
///
/// Unknown keys are ignored. `v1` values that are not valid hex are dropped,
/// since they could never match. The header must carry a numeric `t` and at
/// least one usable `v1`.
pub fn parse_header(header: &str) -> Result<SignatureHeader, SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for item in header.split(',') {
        let Some((key, value)) = item.trim().split_once('=') else {
            continue;
        };

        match key {
            "t" => timestamp = value.parse::<i64>().ok(),
            EXPECTED_SCHEME => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    match timestamp {
        Some(timestamp) if !signatures.is_empty() => Ok(SignatureHeader {
            timestamp,
            signatures,
        }),
        _ => Err(SignatureError::MalformedHeader),
    }
}

/// Compute the hex `v1` signature Stripe would send for `payload` at `timestamp`.
pub fn compute_signature(
    payload: &[u8],
    secret: &str,
    timestamp: i64,
) -> Result<String, SignatureError> {
    let mac = signed_payload_mac(payload, secret, timestamp)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a raw webhook body against its `Stripe-Signature` header.
///
/// # Arguments
///
/// * `payload` - The byte-exact request body
/// * `header` - The `Stripe-Signature` header value
/// * `secret` - The endpoint's signing secret
/// * `tolerance_secs` - Maximum timestamp age; `0` disables the check
pub fn verify(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: u64,
) -> Result<(), SignatureError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    verify_at(
        payload,
        header,
        secret,
        tolerance_secs,
        i64::try_from(now).unwrap_or(i64::MAX),
    )
}

/// [`verify`] with an explicit current time.
pub fn verify_at(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: u64,
    now: i64,
) -> Result<(), SignatureError> {
    if header.trim().is_empty() {
        return Err(SignatureError::MissingHeader);
    }

    let parsed = parse_header(header)?;
    let mac = signed_payload_mac(payload, secret, parsed.timestamp)?;

    // verify_slice compares in constant time
    let matched = parsed
        .signatures
        .iter()
        .any(|candidate| mac.clone().verify_slice(candidate).is_ok());

    if !matched {
        warn!(
            candidates = parsed.signatures.len(),
            body_length = payload.len(),
            "stripe_signature_mismatch"
        );
        return Err(SignatureError::NoMatch);
    }

    let age_secs = now.saturating_sub(parsed.timestamp);
    if tolerance_secs > 0 && age_secs > i64::try_from(tolerance_secs).unwrap_or(i64::MAX) {
        warn!(
            signed_at = parsed.timestamp,
            current_time = now,
            age_seconds = age_secs,
            tolerance_seconds = tolerance_secs,
            "stripe_signature_stale"
        );
        return Err(SignatureError::Stale { age_secs });
    }

    Ok(())
}

fn signed_payload_mac(
    payload: &[u8],
    secret: &str,
    timestamp: i64,
) -> Result<HmacSha256, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| SignatureError::InvalidSecret)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const NOW: i64 = 1_700_000_000;
    const BODY: &[u8] = br#"{"id":"evt_1","type":"checkout.session.completed"}"#;

    fn header_for(payload: &[u8], timestamp: i64) -> String {
        let sig = compute_signature(payload, SECRET, timestamp).unwrap();
        format!("t={},v1={}", timestamp, sig)
    }

    #[test]
    fn test_parse_header() {
        let parsed = parse_header("t=1609459200,v1=abcd,v0=ffff").unwrap();
        assert_eq!(parsed.timestamp, 1609459200);
        assert_eq!(parsed.signatures, vec![vec![0xab, 0xcd]]);
    }

    #[test]
    fn test_parse_header_collects_every_v1() {
        let parsed = parse_header("t=1,v1=00, v1=01,v1=zz").unwrap();
        assert_eq!(parsed.signatures, vec![vec![0x00], vec![0x01]]);
    }

    #[test]
    fn test_parse_header_invalid() {
        assert_eq!(parse_header("invalid"), Err(SignatureError::MalformedHeader));
        assert_eq!(parse_header("t=abc,v1=00"), Err(SignatureError::MalformedHeader));
        assert_eq!(parse_header("t=123"), Err(SignatureError::MalformedHeader));
        assert_eq!(parse_header("v1=00"), Err(SignatureError::MalformedHeader));
    }

    #[test]
    fn test_verify_valid() {
        let header = header_for(BODY, NOW);
        assert_eq!(verify_at(BODY, &header, SECRET, 300, NOW + 10), Ok(()));
    }

    #[test]
    fn test_verify_missing_header() {
        assert_eq!(
            verify_at(BODY, "  ", SECRET, 300, NOW),
            Err(SignatureError::MissingHeader)
        );
    }

    #[test]
    fn test_verify_wrong_secret() {
        let header = header_for(BODY, NOW);
        assert_eq!(
            verify_at(BODY, &header, "whsec_other", 300, NOW),
            Err(SignatureError::NoMatch)
        );
    }

    #[test]
    fn test_verify_tampered_body() {
        let header = header_for(BODY, NOW);
        let tampered = br#"{"id":"evt_1","type":"checkout.session.expired"}"#;
        assert_eq!(
            verify_at(tampered, &header, SECRET, 300, NOW),
            Err(SignatureError::NoMatch)
        );
    }

    #[test]
    fn test_verify_signature_altered_by_one_byte() {
        let mut sig = compute_signature(BODY, SECRET, NOW).unwrap();
        let last = if sig.ends_with('0') { "1" } else { "0" };
        sig.replace_range(sig.len() - 1.., last);
        let header = format!("t={},v1={}", NOW, sig);
        assert_eq!(
            verify_at(BODY, &header, SECRET, 300, NOW),
            Err(SignatureError::NoMatch)
        );
    }

    #[test]
    fn test_verify_accepts_any_matching_v1() {
        let good = compute_signature(BODY, SECRET, NOW).unwrap();
        let header = format!("t={},v1={},v1={}", NOW, "00".repeat(32), good);
        assert_eq!(verify_at(BODY, &header, SECRET, 300, NOW), Ok(()));
    }

    #[test]
    fn test_verify_stale() {
        let header = header_for(BODY, NOW);
        assert_eq!(
            verify_at(BODY, &header, SECRET, 300, NOW + 301),
            Err(SignatureError::Stale { age_secs: 301 })
        );
    }

    #[test]
    fn test_verify_zero_tolerance_skips_age_check() {
        let header = header_for(BODY, NOW);
        assert_eq!(verify_at(BODY, &header, SECRET, 0, NOW + 86_400), Ok(()));
    }

    #[test]
    fn test_verify_uses_wall_clock() {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        let header = header_for(BODY, now);
        assert_eq!(verify(BODY, &header, SECRET, 300), Ok(()));
    }
}

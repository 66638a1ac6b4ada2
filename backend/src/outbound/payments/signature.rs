//! Webhook signature scheme: `t=<unix seconds>,v1=<hex hmac>`.
//!
//! The signed message is `"{t}.{raw body}"` keyed with the endpoint secret
//! using HMAC-SHA256. Several `v1` entries may be present while the
//! processor rotates secrets; any one matching is enough.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::domain::ports::PaymentGatewayError;

type HmacSha256 = Hmac<Sha256>;

/// Maximum clock skew accepted between the signature timestamp and now.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

fn keyed_mac(secret: &[u8], timestamp: i64, payload: &[u8]) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Some(mac)
}

/// Produce a signature header for `payload` as the processor would.
///
/// # Examples
/// ```
/// use songsmith::outbound::payments::{sign_payload, verify_signature};
///
/// let header = sign_payload(b"whsec_demo", 1_700_000_000, b"{}");
/// assert!(header.starts_with("t=1700000000,v1="));
/// assert!(verify_signature(b"whsec_demo", b"{}", &header, 1_700_000_010).is_ok());
/// ```
pub fn sign_payload(secret: &[u8], timestamp: i64, payload: &[u8]) -> String {
    // HMAC accepts keys of any length, so the digest is always present.
    let digest = keyed_mac(secret, timestamp, payload)
        .map(|mac| hex::encode(mac.finalize().into_bytes()))
        .unwrap_or_default();
    format!("t={timestamp},v1={digest}")
}

struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

fn parse_header(header: &str) -> Result<SignatureHeader, PaymentGatewayError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => {
                let parsed = value.parse::<i64>().map_err(|_| {
                    PaymentGatewayError::invalid_signature("timestamp is not an integer")
                })?;
                timestamp = Some(parsed);
            }
            // Undecodable entries cannot match; skip them like unknown schemes.
            "v1" => signatures.extend(hex::decode(value).ok()),
            _ => {}
        }
    }
    let timestamp =
        timestamp.ok_or_else(|| PaymentGatewayError::invalid_signature("missing timestamp"))?;
    if signatures.is_empty() {
        return Err(PaymentGatewayError::invalid_signature("missing v1 signature"));
    }
    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

/// Check `header` against `payload` at unix time `now`.
///
/// # Errors
///
/// Returns [`PaymentGatewayError::InvalidSignature`] when the header is
/// malformed, its timestamp is outside [`SIGNATURE_TOLERANCE_SECS`] of `now`,
/// or no `v1` entry matches.
pub fn verify_signature(
    secret: &[u8],
    payload: &[u8],
    header: &str,
    now: i64,
) -> Result<(), PaymentGatewayError> {
    let parsed = parse_header(header)?;
    if now.abs_diff(parsed.timestamp) > SIGNATURE_TOLERANCE_SECS.unsigned_abs() {
        return Err(PaymentGatewayError::invalid_signature(
            "timestamp outside tolerance",
        ));
    }
    let mac = keyed_mac(secret, parsed.timestamp, payload)
        .ok_or_else(|| PaymentGatewayError::invalid_signature("unusable webhook secret"))?;
    let matched = parsed
        .signatures
        .iter()
        .any(|candidate| mac.clone().verify_slice(candidate).is_ok());
    if matched {
        Ok(())
    } else {
        Err(PaymentGatewayError::invalid_signature("signature mismatch"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const SECRET: &[u8] = b"whsec_unit";
    const NOW: i64 = 1_750_000_000;
    const BODY: &[u8] = br#"{"id":"evt_1"}"#;

    #[rstest]
    fn accepts_its_own_signature() {
        let header = sign_payload(SECRET, NOW, BODY);
        assert!(verify_signature(SECRET, BODY, &header, NOW).is_ok());
    }

    #[rstest]
    fn accepts_any_matching_rotation_entry() {
        let valid = sign_payload(SECRET, NOW, BODY);
        let digest = valid.split_once(",v1=").map(|(_, d)| d).unwrap_or_default();
        let header = format!("t={NOW},v1={},v1={digest}", "00".repeat(32));
        assert!(verify_signature(SECRET, BODY, &header, NOW).is_ok());
    }

    #[rstest]
    #[case::tampered_body(sign_payload(SECRET, NOW, BODY), br#"{"id":"evt_2"}"#.as_slice(), NOW)]
    #[case::wrong_secret(sign_payload(b"other", NOW, BODY), BODY, NOW)]
    #[case::too_old(sign_payload(SECRET, NOW - 301, BODY), BODY, NOW)]
    #[case::from_the_future(sign_payload(SECRET, NOW + 301, BODY), BODY, NOW)]
    #[case::no_timestamp(String::from("v1=abcd"), BODY, NOW)]
    #[case::no_digest(format!("t={NOW}"), BODY, NOW)]
    #[case::garbage(String::from("not a header"), BODY, NOW)]
    fn rejects(#[case] header: String, #[case] body: &[u8], #[case] now: i64) {
        let error = verify_signature(SECRET, body, &header, now).expect_err("rejected");
        assert!(matches!(error, PaymentGatewayError::InvalidSignature { .. }));
    }

    #[rstest]
    fn tolerance_boundary_is_inclusive() {
        let header = sign_payload(SECRET, NOW - SIGNATURE_TOLERANCE_SECS, BODY);
        assert!(verify_signature(SECRET, BODY, &header, NOW).is_ok());
    }
}

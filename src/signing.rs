//! Verification of signed postbacks.
//!
//! A sender signs `timestamp || body` with HMAC-SHA256 and sends the hex
//! digest and the timestamp in two headers. Receivers reject missing,
//! stale or mismatching signatures before the body is looked at.

use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_SIGNATURE_HEADER: &str = "X-Webhook-Signature";
pub const DEFAULT_TIMESTAMP_HEADER: &str = "X-Webhook-Timestamp";

fn mac_for(secret: &[u8], timestamp: Option<&str>, body: &[u8]) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    if let Some(ts) = timestamp {
        mac.update(ts.as_bytes());
    }
    mac.update(body);
    mac
}

/// Hex HMAC-SHA256 of `timestamp || body`.
pub fn compute_signature(secret: &[u8], body: &[u8], timestamp: Option<&str>) -> String {
    hex::encode(mac_for(secret, timestamp, body).finalize().into_bytes())
}

/// Constant-time check of a hex signature.
pub fn verify_signature(secret: &[u8], body: &[u8], timestamp: Option<&str>, signature_hex: &str) -> bool {
    let Ok(signature) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    mac_for(secret, timestamp, body).verify_slice(&signature).is_ok()
}

pub fn is_timestamp_fresh(timestamp_secs: u64, now_secs: u64, max_age_secs: u64) -> bool {
    now_secs >= timestamp_secs && now_secs - timestamp_secs <= max_age_secs
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSignature {
    pub signature: Option<String>,
    pub timestamp: Option<String>,
}

/// Pick the signature and timestamp out of a header list, matching names
/// case-insensitively.
pub fn parse_signature_headers<'a, I>(headers: I, signature_header: &str, timestamp_header: &str) -> ParsedSignature
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    headers
        .into_iter()
        .fold(ParsedSignature::default(), |mut parsed, (name, value)| {
            if name.eq_ignore_ascii_case(signature_header) {
                parsed.signature = Some(value.to_string());
            } else if name.eq_ignore_ascii_case(timestamp_header) {
                parsed.timestamp = Some(value.to_string());
            }
            parsed
        })
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("missing signature header")]
    MissingSignature,
    #[error("missing timestamp header")]
    MissingTimestamp,
    #[error("timestamp is not a number of seconds")]
    InvalidTimestamp,
    #[error("timestamp is outside the accepted window")]
    StaleTimestamp,
    #[error("signature does not match")]
    InvalidSignature,
}

/// Shared secret and header layout for signed postbacks.
#[derive(Debug, Clone)]
pub struct PostbackVerifier {
    secret: Vec<u8>,
    signature_header: String,
    timestamp_header: String,
    max_age_secs: u64,
}

impl PostbackVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            signature_header: DEFAULT_SIGNATURE_HEADER.to_string(),
            timestamp_header: DEFAULT_TIMESTAMP_HEADER.to_string(),
            max_age_secs: 300,
        }
    }

    pub fn with_headers(mut self, signature_header: impl Into<String>, timestamp_header: impl Into<String>) -> Self {
        self.signature_header = signature_header.into();
        self.timestamp_header = timestamp_header.into();
        self
    }

    pub fn with_max_age_secs(mut self, max_age_secs: u64) -> Self {
        self.max_age_secs = max_age_secs;
        self
    }

    pub fn signature_header(&self) -> &str {
        &self.signature_header
    }

    pub fn timestamp_header(&self) -> &str {
        &self.timestamp_header
    }

    /// Headers a sender should attach to `body` at `timestamp_secs`.
    pub fn sign(&self, body: &[u8], timestamp_secs: u64) -> [(String, String); 2] {
        let ts = timestamp_secs.to_string();
        let signature = compute_signature(&self.secret, body, Some(&ts));
        [
            (self.signature_header.clone(), signature),
            (self.timestamp_header.clone(), ts),
        ]
    }

    pub fn verify<'a, I>(&self, headers: I, body: &[u8], now_secs: u64) -> Result<(), VerificationError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let parsed = parse_signature_headers(headers, &self.signature_header, &self.timestamp_header);
        let signature = parsed.signature.ok_or(VerificationError::MissingSignature)?;
        let timestamp = parsed.timestamp.ok_or(VerificationError::MissingTimestamp)?;
        let timestamp_secs = timestamp
            .trim()
            .parse::<u64>()
            .map_err(|_| VerificationError::InvalidTimestamp)?;

        if !is_timestamp_fresh(timestamp_secs, now_secs, self.max_age_secs) {
            return Err(VerificationError::StaleTimestamp);
        }

        if verify_signature(&self.secret, body, Some(&timestamp), &signature) {
            Ok(())
        } else {
            Err(VerificationError::InvalidSignature)
        }
    }

    pub fn verify_now<'a, I>(&self, headers: I, body: &[u8]) -> Result<(), VerificationError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.verify(headers, body, now_secs())
    }
}

pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = br#"{"data":{"v":1},"keys":"acct1"}"#;

    fn headers(pairs: &[(String, String)]) -> Vec<(&str, &str)> {
        pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
    }

    #[test]
    fn signed_postback_verifies() {
        let verifier = PostbackVerifier::new("s3cret");
        let signed = verifier.sign(BODY, 1_700_000_000);
        assert_eq!(verifier.verify(headers(&signed), BODY, 1_700_000_100), Ok(()));
    }

    #[test]
    fn header_names_are_case_insensitive() {
        let verifier = PostbackVerifier::new("s3cret");
        let signed = verifier.sign(BODY, 1_700_000_000);
        let lowered: Vec<(String, String)> = signed
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
            .collect();
        assert_eq!(verifier.verify(headers(&lowered), BODY, 1_700_000_000), Ok(()));
    }

    #[test]
    fn tampered_body_is_rejected() {
        let verifier = PostbackVerifier::new("s3cret");
        let signed = verifier.sign(BODY, 1_700_000_000);
        assert_eq!(
            verifier.verify(headers(&signed), b"{}", 1_700_000_000),
            Err(VerificationError::InvalidSignature)
        );
    }

    #[test]
    fn stale_and_future_timestamps_are_rejected() {
        let verifier = PostbackVerifier::new("s3cret").with_max_age_secs(60);
        let signed = verifier.sign(BODY, 1_700_000_000);
        assert_eq!(
            verifier.verify(headers(&signed), BODY, 1_700_000_061),
            Err(VerificationError::StaleTimestamp)
        );
        assert_eq!(
            verifier.verify(headers(&signed), BODY, 1_699_999_999),
            Err(VerificationError::StaleTimestamp)
        );
    }

    #[test]
    fn missing_headers_are_reported() {
        let verifier = PostbackVerifier::new("s3cret");
        assert_eq!(verifier.verify(Vec::<(&str, &str)>::new(), BODY, 0), Err(VerificationError::MissingSignature));
        assert_eq!(
            verifier.verify(vec![(DEFAULT_SIGNATURE_HEADER, "00")], BODY, 0),
            Err(VerificationError::MissingTimestamp)
        );
    }

    #[test]
    fn garbage_signature_is_not_hex() {
        assert!(!verify_signature(b"k", BODY, None, "not-hex"));
    }
}

use std::sync::Arc;

use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

use crate::canonical::canonicalize;
use crate::clock::{Clock, SystemClock};
use crate::error::SigningError;
use crate::types::{IntegrationId, SecretKey, SignatureToken};

type HmacSha256 = Hmac<Sha256>;

/// Header that carries the signature token.
pub const SIGNATURE_HEADER: &str = "x-signature";

#[cfg(feature = "metrics")]
fn metric_inc(name: &'static str) {
    metrics::increment_counter!(name);
}

#[cfg(not(feature = "metrics"))]
fn metric_inc(_name: &'static str) {}

/// Produces signature tokens for outbound requests.
///
/// Holds no per-call state; one `Signer` can be shared across threads.
#[derive(Clone)]
pub struct Signer {
    clock: Arc<dyn Clock>,
}

impl Default for Signer {
    fn default() -> Self {
        Self { clock: Arc::new(SystemClock) }
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer").finish_non_exhaustive()
    }
}

impl Signer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sign `body` for `integration_id` at the current time.
    pub fn sign<T>(
        &self,
        body: &T,
        integration_id: &IntegrationId,
        secret: &SecretKey,
    ) -> Result<SignatureToken, SigningError>
    where
        T: Serialize + ?Sized,
    {
        self.sign_at(body, integration_id, secret, self.clock.now_ms())
    }

    /// Sign `body` with an explicit timestamp in milliseconds.
    pub fn sign_at<T>(
        &self,
        body: &T,
        integration_id: &IntegrationId,
        secret: &SecretKey,
        timestamp_ms: u64,
    ) -> Result<SignatureToken, SigningError>
    where
        T: Serialize + ?Sized,
    {
        let canonical = canonicalize(body)?;
        let digest = compute_digest(secret.as_bytes(), &canonical, &timestamp_ms.to_string());
        metric_inc("signature_signed");
        Ok(SignatureToken::new(integration_id.clone(), timestamp_ms, digest))
    }
}

/// Sign `body` with the system clock and return the token string.
///
/// Fails if the integration id is empty or dotted, or if the body has no
/// canonical encoding.
pub fn sign<T>(body: &T, integration_id: &str, secret: &[u8]) -> Result<String, SigningError>
where
    T: Serialize + ?Sized,
{
    let integration_id = IntegrationId::new(integration_id)?;
    let token = Signer::new().sign(body, &integration_id, &SecretKey::new(secret))?;
    Ok(token.to_string())
}

fn keyed_mac(secret: &[u8], canonical_body: &str, timestamp: &str) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(canonical_body.as_bytes());
    mac.update(timestamp.as_bytes());
    mac
}

/// Lowercase hex HMAC-SHA256 over `canonical_body` followed by `timestamp`.
pub fn compute_digest(secret: &[u8], canonical_body: &str, timestamp: &str) -> String {
    hex::encode(keyed_mac(secret, canonical_body, timestamp).finalize().into_bytes())
}

/// Constant-time check of a hex digest against the expected HMAC.
pub fn digest_matches(secret: &[u8], canonical_body: &str, timestamp: &str, digest_hex: &str) -> bool {
    let Ok(digest) = hex::decode(digest_hex) else {
        return false;
    };

    keyed_mac(secret, canonical_body, timestamp)
        .verify_slice(&digest)
        .is_ok()
}

/// Find the signature token among request headers (case-insensitive).
pub fn signature_from_headers<'a, I>(headers: I) -> Option<&'a str>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    headers
        .into_iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(SIGNATURE_HEADER))
        .map(|(_, value)| value.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use serde_json::json;

    #[test]
    fn digest_covers_body_then_timestamp() {
        let split = compute_digest(b"s3cr3t", r#"{"a":1}"#, "1700000000000");
        let joined = compute_digest(b"s3cr3t", r#"{"a":1}1700000000000"#, "");
        assert_eq!(split, joined);
        assert_eq!(split.len(), 64);
        assert!(split.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)));
    }

    #[test]
    fn digest_matches_rejects_other_inputs() {
        let digest = compute_digest(b"s3cr3t", "{}", "1");
        assert!(digest_matches(b"s3cr3t", "{}", "1", &digest));
        assert!(!digest_matches(b"other", "{}", "1", &digest));
        assert!(!digest_matches(b"s3cr3t", "{}", "2", &digest));
        assert!(!digest_matches(b"s3cr3t", "{}", "1", "zz"));
        assert!(!digest_matches(b"s3cr3t", "{}", "1", &digest[..62]));
    }

    #[test]
    fn signer_uses_clock_timestamp() {
        let signer = Signer::new().with_clock(Arc::new(FixedClock::new(1_700_000_000_123)));
        let id = IntegrationId::new("acme").unwrap();
        let secret = SecretKey::from("s3cr3t");

        let token = signer.sign(&json!({"b": 2, "a": 1}), &id, &secret).unwrap();
        assert_eq!(token.timestamp_str(), "1700000000123");
        assert_eq!(
            token.digest(),
            compute_digest(b"s3cr3t", r#"{"a":1,"b":2}"#, "1700000000123")
        );
        assert!(token.to_string().starts_with("acme.1700000000123."));
    }

    #[test]
    fn free_sign_rejects_dotted_integration_id() {
        let err = sign(&json!({}), "acme.eu", b"s3cr3t").unwrap_err();
        assert!(matches!(err, SigningError::InvalidIntegrationId { .. }));
    }

    #[test]
    fn free_sign_propagates_serialization_errors() {
        let err = sign(&[f64::NAN], "acme", b"s3cr3t").unwrap_err();
        assert!(matches!(err, SigningError::Serialization(_)));
    }

    #[test]
    fn finds_signature_header_case_insensitively() {
        let headers = [("Content-Type", "application/json"), ("X-Signature", " acme.1.ff ")];
        assert_eq!(signature_from_headers(headers), Some("acme.1.ff"));
        assert_eq!(signature_from_headers([("x-other", "v")]), None);
    }
}

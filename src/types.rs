use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{SigningError, VerificationError};

/// Separator between the three token segments.
pub(crate) const TOKEN_SEPARATOR: char = '.';

/// Length of a hex-encoded SHA-256 digest.
pub(crate) const DIGEST_HEX_LEN: usize = 64;

/// Identifier of a partner integration.
///
/// The id is embedded verbatim as the first token segment, so it must be
/// non-empty and must not contain `.`. Both rules are enforced here; a
/// dotted id is a precondition violation, not something the token parser
/// tries to recover from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IntegrationId(String);

impl IntegrationId {
    pub fn new(id: impl Into<String>) -> Result<Self, SigningError> {
        let id = id.into();
        if id.is_empty() || id.contains(TOKEN_SEPARATOR) {
            return Err(SigningError::InvalidIntegrationId { integration_id: id });
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for IntegrationId {
    type Error = SigningError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for IntegrationId {
    type Error = SigningError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<IntegrationId> for String {
    fn from(id: IntegrationId) -> Self {
        id.0
    }
}

impl AsRef<str> for IntegrationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IntegrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pre-shared HMAC key for one integration.
///
/// The bytes are wiped on drop and never appear in `Debug` output.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey(Vec<u8>);

impl SecretKey {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self(secret.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

impl From<&str> for SecretKey {
    fn from(secret: &str) -> Self {
        Self::new(secret.as_bytes())
    }
}

impl From<String> for SecretKey {
    fn from(secret: String) -> Self {
        Self::new(secret.into_bytes())
    }
}

impl From<&[u8]> for SecretKey {
    fn from(secret: &[u8]) -> Self {
        Self::new(secret)
    }
}

impl From<Vec<u8>> for SecretKey {
    fn from(secret: Vec<u8>) -> Self {
        Self(secret)
    }
}

/// A signature token: `integrationId.timestampMs.hexDigest`.
///
/// The timestamp is kept as the literal substring that was signed, so
/// verification hashes exactly the bytes the sender hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureToken {
    integration_id: IntegrationId,
    timestamp: String,
    digest: String,
}

impl SignatureToken {
    pub(crate) fn new(integration_id: IntegrationId, timestamp_ms: u64, digest: String) -> Self {
        Self {
            integration_id,
            timestamp: timestamp_ms.to_string(),
            digest,
        }
    }

    pub fn integration_id(&self) -> &IntegrationId {
        &self.integration_id
    }

    /// Timestamp segment exactly as it appears in the token.
    pub fn timestamp_str(&self) -> &str {
        &self.timestamp
    }

    /// Timestamp segment as milliseconds since the Unix epoch.
    pub fn timestamp_ms(&self) -> Result<u64, VerificationError> {
        self.timestamp
            .parse::<u64>()
            .map_err(|_| VerificationError::InvalidTimestamp)
    }

    /// Lowercase hex HMAC-SHA256 digest.
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

impl FromStr for SignatureToken {
    type Err = VerificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(TOKEN_SEPARATOR).collect();
        let [id, timestamp, digest] = parts.as_slice() else {
            return Err(VerificationError::MalformedToken);
        };

        if timestamp.is_empty() || !is_lower_hex_digest(digest) {
            return Err(VerificationError::MalformedToken);
        }

        let integration_id =
            IntegrationId::new(*id).map_err(|_| VerificationError::MalformedToken)?;

        Ok(Self {
            integration_id,
            timestamp: (*timestamp).to_string(),
            digest: (*digest).to_string(),
        })
    }
}

impl fmt::Display for SignatureToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.integration_id, self.timestamp, self.digest)
    }
}

fn is_lower_hex_digest(s: &str) -> bool {
    s.len() == DIGEST_HEX_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

use std::fmt;

/// Body could not be turned into its canonical JSON form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializationError {
    message: String,
}

impl SerializationError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl fmt::Display for SerializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "body is not canonically encodable: {}", self.message)
    }
}

impl std::error::Error for SerializationError {}

impl From<serde_json::Error> for SerializationError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Errors returned when a request cannot be signed.
///
/// Signing failures are fatal for the request: the caller must not send it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningError {
    /// Body contains values with no canonical encoding.
    Serialization(SerializationError),

    /// Integration id is empty or contains the `.` token separator.
    InvalidIntegrationId {
        integration_id: String,
    },
}

impl fmt::Display for SigningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigningError::Serialization(err) =>
                write!(f, "cannot sign request: {}", err),
            SigningError::InvalidIntegrationId { integration_id } =>
                write!(f, "invalid integration id: {:?}", integration_id),
        }
    }
}

impl std::error::Error for SigningError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SigningError::Serialization(err) => Some(err),
            SigningError::InvalidIntegrationId { .. } => None,
        }
    }
}

impl From<SerializationError> for SigningError {
    fn from(err: SerializationError) -> Self {
        SigningError::Serialization(err)
    }
}

/// Reasons a received signature was rejected.
///
/// Only [`Verifier::check`](crate::Verifier::check) exposes these; the
/// boolean `verify` entry points collapse every variant to `false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    /// Token does not split into three non-empty parts, or the hash segment
    /// is not 64 lowercase hex characters.
    MalformedToken,

    /// Secret lookup failed for the token's integration id.
    SecretUnavailable,

    /// Timestamp segment is not a decimal integer.
    InvalidTimestamp,

    /// Timestamp lies outside the tolerance window.
    StaleTimestamp,

    /// Token was issued for a different integration than expected.
    IntegrationMismatch,

    /// Body could not be canonicalized.
    Serialization,

    /// Digest does not match.
    InvalidSignature,
}

impl VerificationError {
    /// Short, stable label used for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationError::MalformedToken => "malformed_token",
            VerificationError::SecretUnavailable => "secret_unavailable",
            VerificationError::InvalidTimestamp => "invalid_timestamp",
            VerificationError::StaleTimestamp => "stale_timestamp",
            VerificationError::IntegrationMismatch => "integration_mismatch",
            VerificationError::Serialization => "serialization",
            VerificationError::InvalidSignature => "invalid_signature",
        }
    }
}

impl fmt::Display for VerificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationError::MalformedToken =>
                write!(f, "malformed signature token"),
            VerificationError::SecretUnavailable =>
                write!(f, "secret could not be resolved"),
            VerificationError::InvalidTimestamp =>
                write!(f, "invalid signature timestamp"),
            VerificationError::StaleTimestamp =>
                write!(f, "signature timestamp outside tolerance"),
            VerificationError::IntegrationMismatch =>
                write!(f, "signature issued for another integration"),
            VerificationError::Serialization =>
                write!(f, "body could not be canonicalized"),
            VerificationError::InvalidSignature =>
                write!(f, "signature mismatch"),
        }
    }
}

impl std::error::Error for VerificationError {}

/// Failure reported by a [`SecretResolver`](crate::SecretResolver).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// No secret is registered for the integration.
    Unknown {
        integration_id: String,
    },

    /// Backing store failed or the lookup was cancelled.
    Unavailable(String),
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::Unknown { integration_id } =>
                write!(f, "no secret for integration: {}", integration_id),
            ResolveError::Unavailable(reason) =>
                write!(f, "secret store unavailable: {}", reason),
        }
    }
}

impl std::error::Error for ResolveError {}

//! Request signing and verification for partner webhook integrations.
//!
//! A signature token has the form `integrationId.timestampMs.hexDigest`,
//! where the digest is HMAC-SHA256 over the canonical JSON body followed by
//! the decimal timestamp.
//!
//! ## Guarantees
//! - Canonical bodies: object keys sorted at every depth, no whitespace
//! - Constant-time digest comparison
//! - Symmetric freshness window (default five minutes)
//! - Verification never errors out: every failure is `false`
//!
//! ## Non-Guarantees
//! - Key storage, rotation or algorithm negotiation
//! - Replay detection beyond the freshness window
//! - Transport of the `x-signature` header
//!
//! The secret store is injected through [`SecretResolver`]; nothing here
//! caches or logs secrets.

mod canonical;
mod clock;
mod error;
mod resolver;
mod signing;
mod types;
mod verify;

pub use canonical::canonicalize;
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{
    ResolveError,
    SerializationError,
    SigningError,
    VerificationError,
};
pub use resolver::{InMemorySecrets, SecretResolver};
pub use signing::{
    compute_digest,
    digest_matches,
    sign,
    signature_from_headers,
    Signer,
    SIGNATURE_HEADER,
};
pub use types::{IntegrationId, SecretKey, SignatureToken};
pub use verify::{
    is_within_tolerance,
    verify,
    verify_with_tolerance,
    Verifier,
    VerifierConfig,
    DEFAULT_TOLERANCE_MS,
};

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::FutureExt;
use serde::{Deserialize, Serialize};

use crate::canonical::canonicalize;
use crate::clock::{Clock, SystemClock};
use crate::error::VerificationError;
use crate::resolver::SecretResolver;
use crate::signing::digest_matches;
use crate::types::{IntegrationId, SecretKey, SignatureToken};

/// Default freshness window: five minutes.
pub const DEFAULT_TOLERANCE_MS: u64 = 300_000;

#[cfg(feature = "metrics")]
fn metric_inc(name: &'static str) {
    metrics::increment_counter!(name);
}

#[cfg(not(feature = "metrics"))]
fn metric_inc(_name: &'static str) {}

#[cfg(feature = "metrics")]
fn metric_inc_reason(name: &'static str, err: &VerificationError) {
    metrics::increment_counter!(name, "reason" => err.as_str());
}

#[cfg(not(feature = "metrics"))]
fn metric_inc_reason(_name: &'static str, _err: &VerificationError) {}

#[cfg(feature = "tracing")]
fn trace_rejection(integration_id: Option<&IntegrationId>, err: &VerificationError) {
    match integration_id {
        Some(id) => tracing::debug!(integration_id = %id, reason = err.as_str(), "signature rejected"),
        None => tracing::debug!(reason = err.as_str(), "signature rejected"),
    }
}

#[cfg(not(feature = "tracing"))]
fn trace_rejection(_integration_id: Option<&IntegrationId>, _err: &VerificationError) {}

#[cfg(feature = "tracing")]
fn trace_resolve_failure(integration_id: &IntegrationId, error: &dyn std::fmt::Display) {
    tracing::debug!(integration_id = %integration_id, error = %error, "secret resolution failed");
}

#[cfg(not(feature = "tracing"))]
fn trace_resolve_failure(_integration_id: &IntegrationId, _error: &dyn std::fmt::Display) {}

/// Verifier settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Maximum allowed distance, in either direction, between the token
    /// timestamp and the current time.
    pub tolerance_ms: u64,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self { tolerance_ms: DEFAULT_TOLERANCE_MS }
    }
}

impl VerifierConfig {
    pub fn with_tolerance(mut self, tolerance_ms: u64) -> Self {
        self.tolerance_ms = tolerance_ms;
        self
    }
}

/// Checks signature tokens on inbound requests.
///
/// Every entry point fails closed: malformed tokens, lookup failures,
/// stale timestamps and digest mismatches all come back as `false`
/// (or as a [`VerificationError`] from [`Verifier::check`]).
#[derive(Clone)]
pub struct Verifier {
    config: VerifierConfig,
    clock: Arc<dyn Clock>,
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new(VerifierConfig::default())
    }
}

impl std::fmt::Debug for Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verifier")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Verifier {
    pub fn new(config: VerifierConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
        }
    }

    /// Use a custom time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Verify `signature` against `body`, resolving the secret through
    /// `resolver`.
    pub async fn verify<T, R>(&self, signature: &str, body: &T, resolver: &R) -> bool
    where
        T: Serialize + ?Sized,
        R: SecretResolver + ?Sized,
    {
        self.check(signature, body, resolver).await.is_ok()
    }

    /// Same as [`Verifier::verify`] but reports why a token was rejected.
    pub async fn check<T, R>(
        &self,
        signature: &str,
        body: &T,
        resolver: &R,
    ) -> Result<(), VerificationError>
    where
        T: Serialize + ?Sized,
        R: SecretResolver + ?Sized,
    {
        let token: SignatureToken = match signature.parse() {
            Ok(token) => token,
            Err(err) => return observe(None, Err(err)),
        };
        let result = match resolve_secret(resolver, token.integration_id()).await {
            Ok(secret) => self.check_token(&token, body, &secret),
            Err(err) => Err(err),
        };
        observe(Some(token.integration_id()), result)
    }

    /// Verify with a synchronous secret lookup.
    ///
    /// An error or a panic inside `resolve` rejects the token.
    pub fn verify_blocking<T, F, E>(&self, signature: &str, body: &T, resolve: F) -> bool
    where
        T: Serialize + ?Sized,
        F: FnOnce(&IntegrationId) -> Result<SecretKey, E>,
        E: std::fmt::Display,
    {
        let token: SignatureToken = match signature.parse() {
            Ok(token) => token,
            Err(err) => return observe(None, Err(err)).is_ok(),
        };
        let id = token.integration_id();
        let result = match panic::catch_unwind(AssertUnwindSafe(|| resolve(id))) {
            Ok(Ok(secret)) => self.check_token(&token, body, &secret),
            Ok(Err(err)) => {
                trace_resolve_failure(id, &err);
                Err(VerificationError::SecretUnavailable)
            }
            Err(_) => {
                trace_resolve_failure(id, &"resolver panicked");
                Err(VerificationError::SecretUnavailable)
            }
        };
        observe(Some(id), result).is_ok()
    }

    /// Verify a token that must belong to `integration_id`, using a secret
    /// the caller already holds.
    pub fn verify_with_secret<T>(
        &self,
        signature: &str,
        body: &T,
        integration_id: &IntegrationId,
        secret: &SecretKey,
    ) -> bool
    where
        T: Serialize + ?Sized,
    {
        let token: SignatureToken = match signature.parse() {
            Ok(token) => token,
            Err(err) => return observe(None, Err(err)).is_ok(),
        };
        let result = if token.integration_id() != integration_id {
            Err(VerificationError::IntegrationMismatch)
        } else {
            self.check_token(&token, body, secret)
        };
        observe(Some(token.integration_id()), result).is_ok()
    }

    /// Freshness and digest checks for a parsed token.
    fn check_token<T>(
        &self,
        token: &SignatureToken,
        body: &T,
        secret: &SecretKey,
    ) -> Result<(), VerificationError>
    where
        T: Serialize + ?Sized,
    {
        let timestamp_ms = token.timestamp_ms()?;
        if !is_within_tolerance(timestamp_ms, self.clock.now_ms(), self.config.tolerance_ms) {
            return Err(VerificationError::StaleTimestamp);
        }

        let canonical = canonicalize(body).map_err(|_| VerificationError::Serialization)?;

        // Hash the literal timestamp text from the token, not a re-rendered number.
        if digest_matches(secret.as_bytes(), &canonical, token.timestamp_str(), token.digest()) {
            Ok(())
        } else {
            Err(VerificationError::InvalidSignature)
        }
    }
}

/// `true` when `timestamp_ms` is no more than `tolerance_ms` away from
/// `now_ms`, in either direction.
pub fn is_within_tolerance(timestamp_ms: u64, now_ms: u64, tolerance_ms: u64) -> bool {
    now_ms.abs_diff(timestamp_ms) <= tolerance_ms
}

async fn resolve_secret<R>(resolver: &R, integration_id: &IntegrationId) -> Result<SecretKey, VerificationError>
where
    R: SecretResolver + ?Sized,
{
    // The call itself sits inside the guarded future: an impl may panic
    // before handing back its boxed future.
    let lookup = async { resolver.resolve(integration_id).await };
    match AssertUnwindSafe(lookup).catch_unwind().await {
        Ok(Ok(secret)) => Ok(secret),
        Ok(Err(err)) => {
            trace_resolve_failure(integration_id, &err);
            Err(VerificationError::SecretUnavailable)
        }
        Err(_) => {
            trace_resolve_failure(integration_id, &"resolver panicked");
            Err(VerificationError::SecretUnavailable)
        }
    }
}

fn observe(
    integration_id: Option<&IntegrationId>,
    result: Result<(), VerificationError>,
) -> Result<(), VerificationError> {
    match &result {
        Ok(()) => metric_inc("signature_verified"),
        Err(err) => {
            trace_rejection(integration_id, err);
            metric_inc_reason("signature_rejected", err);
        }
    }
    result
}

/// Verify with the system clock and the default five minute tolerance.
pub async fn verify<T, R>(signature: &str, body: &T, resolver: &R) -> bool
where
    T: Serialize + ?Sized,
    R: SecretResolver + ?Sized,
{
    Verifier::default().verify(signature, body, resolver).await
}

/// Verify with the system clock and a custom tolerance.
pub async fn verify_with_tolerance<T, R>(
    signature: &str,
    body: &T,
    resolver: &R,
    tolerance_ms: u64,
) -> bool
where
    T: Serialize + ?Sized,
    R: SecretResolver + ?Sized,
{
    Verifier::new(VerifierConfig::default().with_tolerance(tolerance_ms))
        .verify(signature, body, resolver)
        .await
}

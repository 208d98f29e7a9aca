use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ResolveError;
use crate::types::{IntegrationId, SecretKey};

/// Looks up the pre-shared secret for an integration.
///
/// Implemented by whatever key store the host uses. Verification calls
/// `resolve` at most once per token and treats any error as a rejection;
/// timeouts and retries are the implementation's business.
#[async_trait]
pub trait SecretResolver: Send + Sync {
    async fn resolve(&self, integration_id: &IntegrationId) -> Result<SecretKey, ResolveError>;
}

#[async_trait]
impl<R> SecretResolver for Arc<R>
where
    R: SecretResolver + ?Sized,
{
    async fn resolve(&self, integration_id: &IntegrationId) -> Result<SecretKey, ResolveError> {
        (**self).resolve(integration_id).await
    }
}

/// Fixed in-memory secret table for tests and small deployments.
#[derive(Debug, Clone, Default)]
pub struct InMemorySecrets {
    secrets: HashMap<IntegrationId, SecretKey>,
}

impl InMemorySecrets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a secret for an integration, replacing any previous one.
    pub fn with_secret(mut self, integration_id: IntegrationId, secret: impl Into<SecretKey>) -> Self {
        self.secrets.insert(integration_id, secret.into());
        self
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

#[async_trait]
impl SecretResolver for InMemorySecrets {
    async fn resolve(&self, integration_id: &IntegrationId) -> Result<SecretKey, ResolveError> {
        self.secrets
            .get(integration_id)
            .cloned()
            .ok_or_else(|| ResolveError::Unknown {
                integration_id: integration_id.to_string(),
            })
    }
}

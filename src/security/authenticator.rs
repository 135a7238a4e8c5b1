use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::ClientIdentity;
use crate::error::GatewayError;
use crate::security::audit_log::AuditLogger;
use crate::security::credential_cache::CredentialCache;
use crate::upstream::{Credential, PlatformClient};

/// Resolves the account-level credential, refreshing it through the
/// identity provider when the cache is empty or expired.
///
/// Refreshes are single-flight: concurrent callers that miss the cache wait
/// on one upstream handshake instead of each running their own.
#[derive(Debug, Clone)]
pub struct Authenticator {
    client: PlatformClient,
    identity: Arc<ClientIdentity>,
    cache: CredentialCache,
    refresh: Arc<Mutex<()>>,
    audit: AuditLogger,
}

impl Authenticator {
    pub fn new(client: PlatformClient, identity: ClientIdentity, cache: CredentialCache) -> Self {
        Self {
            client,
            identity: Arc::new(identity),
            cache,
            refresh: Arc::new(Mutex::new(())),
            audit: AuditLogger::new(),
        }
    }

    pub fn cache(&self) -> &CredentialCache {
        &self.cache
    }

    pub async fn credential(&self) -> Result<Credential, GatewayError> {
        if let Some(credential) = self.cache.get_valid().await {
            debug!("cached credential still valid");
            return Ok(credential);
        }

        let _guard = self.refresh.lock().await;
        // Another task may have refreshed while we waited.
        if let Some(credential) = self.cache.get_valid().await {
            debug!("credential refreshed by concurrent request");
            return Ok(credential);
        }

        info!(client_id = %self.identity.client_id, "requesting new credential");
        match self.client.get_token(&self.identity).await {
            Ok(credential) => {
                let expires_at = self.cache.store(credential.clone()).await;
                self.audit
                    .credential_refreshed(&self.identity.client_id, &expires_at.to_rfc3339());
                Ok(credential)
            }
            Err(err) => {
                self.audit
                    .auth_failure(&self.identity.client_id, &err.to_string());
                Err(GatewayError::Authentication(err))
            }
        }
    }

    pub async fn invalidate(&self) {
        self.cache.clear().await;
        debug!("credential cache cleared");
    }
}

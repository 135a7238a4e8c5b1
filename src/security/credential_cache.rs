use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use crate::upstream::Credential;

#[derive(Debug, Clone)]
struct Entry {
    credential: Credential,
    expires_at: DateTime<Utc>,
}

/// Account credential shared by every request, valid until a fixed expiry.
#[derive(Debug, Clone)]
pub struct CredentialCache {
    entry: Arc<RwLock<Option<Entry>>>,
    ttl: TimeDelta,
}

impl CredentialCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entry: Arc::new(RwLock::new(None)),
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
        }
    }

    pub async fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now()).await
    }

    /// True iff a credential is present and `now` is strictly before its expiry.
    pub async fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.get_valid_at(now).await.is_some()
    }

    pub async fn get_valid(&self) -> Option<Credential> {
        self.get_valid_at(Utc::now()).await
    }

    pub async fn get_valid_at(&self, now: DateTime<Utc>) -> Option<Credential> {
        let entry = self.entry.read().await;
        entry
            .as_ref()
            .filter(|e| now < e.expires_at)
            .map(|e| e.credential.clone())
    }

    /// Replace the cached credential; returns the new expiry instant.
    pub async fn store(&self, credential: Credential) -> DateTime<Utc> {
        self.store_at(credential, Utc::now()).await
    }

    pub async fn store_at(&self, credential: Credential, now: DateTime<Utc>) -> DateTime<Utc> {
        let expires_at = now
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let mut entry = self.entry.write().await;
        *entry = Some(Entry {
            credential,
            expires_at,
        });
        debug!(%expires_at, "credential cached");
        expires_at
    }

    pub async fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.entry.read().await.as_ref().map(|e| e.expires_at)
    }

    pub async fn clear(&self) {
        self.entry.write().await.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_CREDENTIAL_TTL;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[tokio::test]
    async fn test_empty_cache_is_invalid() {
        let cache = CredentialCache::new(DEFAULT_CREDENTIAL_TTL);
        assert!(!cache.is_valid().await);
        assert!(cache.get_valid().await.is_none());
        assert!(cache.expires_at().await.is_none());
    }

    #[tokio::test]
    async fn test_valid_until_strictly_before_expiry() {
        let cache = CredentialCache::new(Duration::from_secs(60));
        let expiry = cache.store_at(Credential::bearer("a"), at(0)).await;
        assert_eq!(expiry, at(60));

        assert!(cache.is_valid_at(at(0)).await);
        assert!(cache.is_valid_at(at(59)).await);
        assert!(!cache.is_valid_at(at(60)).await);
        assert!(!cache.is_valid_at(at(61)).await);
    }

    #[tokio::test]
    async fn test_default_ttl_is_one_day() {
        let cache = CredentialCache::new(DEFAULT_CREDENTIAL_TTL);
        cache.store_at(Credential::bearer("a"), at(0)).await;
        assert!(cache.is_valid_at(at(24 * 3600 - 1)).await);
        assert!(!cache.is_valid_at(at(24 * 3600)).await);
    }

    #[tokio::test]
    async fn test_store_replaces_previous_credential() {
        let cache = CredentialCache::new(Duration::from_secs(60));
        cache.store_at(Credential::bearer("old"), at(0)).await;
        cache.store_at(Credential::bearer("new"), at(100)).await;

        let current = cache.get_valid_at(at(120)).await.unwrap();
        assert_eq!(current.token(), Some("new"));
    }

    #[tokio::test]
    async fn test_zero_ttl_never_valid() {
        let cache = CredentialCache::new(Duration::ZERO);
        cache.store_at(Credential::bearer("a"), at(0)).await;
        assert!(!cache.is_valid_at(at(0)).await);
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = CredentialCache::new(Duration::from_secs(60));
        cache.store(Credential::bearer("a")).await;
        assert!(cache.is_valid().await);
        cache.clear().await;
        assert!(!cache.is_valid().await);
    }

    #[tokio::test]
    async fn test_clone_shares_state() {
        let cache = CredentialCache::new(Duration::from_secs(60));
        let cloned = cache.clone();
        cloned.store(Credential::bearer("shared")).await;
        assert_eq!(
            cache.get_valid().await.unwrap().token(),
            Some("shared")
        );
    }
}

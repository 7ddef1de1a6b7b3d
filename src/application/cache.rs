//! Cache Service - conversation and session-snapshot caching.
//!
//! Every failure of the underlying store is absorbed here: reads degrade to a
//! miss and writes become no-ops, each logged at `warn`. Callers never see a
//! cache error.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::discovery::{
    session_key, CacheKeyParams, CachePolicy, DiscoverySession, Message,
};
use crate::domain::foundation::{SessionId, Timestamp};
use crate::ports::CacheStore;

/// Opening transcript cached under a derived conversation key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedConversation {
    pub item_name: String,
    pub transcript: Vec<Message>,
    pub cached_at: Timestamp,
}

impl CachedConversation {
    pub fn new(item_name: impl Into<String>, transcript: Vec<Message>) -> Self {
        Self {
            item_name: item_name.into(),
            transcript,
            cached_at: Timestamp::now(),
        }
    }
}

/// TTL-respecting wrapper around a [`CacheStore`].
#[derive(Clone)]
pub struct CacheService {
    store: Arc<dyn CacheStore>,
    policy: CachePolicy,
}

impl CacheService {
    pub fn new(store: Arc<dyn CacheStore>, policy: CachePolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub fn derive_key(&self, params: &CacheKeyParams) -> String {
        self.policy.derive_key(params)
    }

    pub fn should_use_cache(&self, params: &CacheKeyParams) -> bool {
        self.policy.should_use_cache(params)
    }

    /// Reads and decodes `key`. Any failure is a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(cache_key = %key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(cache_key = %key, error = %e, "Undecodable cache entry, treating as miss");
                None
            }
        }
    }

    /// Encodes and writes `value`. Returns whether the write landed.
    pub async fn put<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) -> bool {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(cache_key = %key, error = %e, "Failed to encode cache entry");
                return false;
            }
        };

        match self.store.put(key, &raw, ttl_secs).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(cache_key = %key, error = %e, "Cache write failed");
                false
            }
        }
    }

    pub async fn get_conversation(&self, key: &str) -> Option<CachedConversation> {
        self.get(key).await
    }

    /// Caches an opening transcript with the tier-dependent TTL.
    pub async fn put_conversation(
        &self,
        key: &str,
        conversation: &CachedConversation,
        price_tier: Option<&str>,
    ) -> bool {
        let ttl = self.policy.conversation_ttl_secs(price_tier);
        self.put(key, conversation, ttl).await
    }

    pub async fn get_session(&self, id: &SessionId) -> Option<DiscoverySession> {
        self.get(&session_key(id)).await
    }

    /// Refreshes the snapshot of `session` with the long session TTL.
    ///
    /// A snapshot that cannot be refreshed is dropped rather than left stale.
    pub async fn put_session(&self, session: &DiscoverySession) -> bool {
        let ttl = self.policy.session_ttl_secs();
        let written = self.put(&session_key(session.id()), session, ttl).await;
        if !written {
            self.invalidate_session(session.id()).await;
        }
        written
    }

    /// Removes the snapshot of a session. Failures are logged and ignored.
    pub async fn invalidate_session(&self, id: &SessionId) {
        let key = session_key(id);
        if let Err(e) = self.store.delete(&key).await {
            tracing::warn!(cache_key = %key, error = %e, "Failed to drop session snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::cache::InMemoryCacheStore;
    use crate::domain::discovery::RestaurantContext;
    use crate::domain::foundation::UserId;
    use std::time::Duration;

    fn service() -> (CacheService, InMemoryCacheStore) {
        let store = InMemoryCacheStore::new();
        (
            CacheService::new(Arc::new(store.clone()), CachePolicy::default()),
            store,
        )
    }

    fn transcript() -> Vec<Message> {
        vec![
            Message::system("sys"),
            Message::user("I want to add pizza", None),
            Message::assistant("Which sizes?"),
        ]
    }

    #[tokio::test]
    async fn conversation_round_trips() {
        let (cache, _) = service();
        let conversation = CachedConversation::new("Pizza", transcript());
        assert!(cache.put_conversation("k", &conversation, None).await);
        assert_eq!(cache.get_conversation("k").await, Some(conversation));
    }

    #[tokio::test]
    async fn premium_conversations_live_twice_as_long() {
        let (cache, store) = service();
        let conversation = CachedConversation::new("Pizza", transcript());
        cache.put_conversation("std", &conversation, Some("medium")).await;
        cache.put_conversation("prem", &conversation, Some("premium")).await;

        let standard = store.ttl("std").await.unwrap();
        let premium = store.ttl("prem").await.unwrap();
        assert!(standard <= Duration::from_secs(86_400));
        assert!(premium > Duration::from_secs(86_400));
    }

    #[tokio::test]
    async fn unavailable_store_degrades_to_miss() {
        let (cache, store) = service();
        cache
            .put_conversation("k", &CachedConversation::new("Pizza", transcript()), None)
            .await;
        store.set_unavailable(true);

        assert_eq!(cache.get_conversation("k").await, None);
        assert!(
            !cache
                .put_conversation("k", &CachedConversation::new("Pizza", vec![]), None)
                .await
        );
    }

    #[tokio::test]
    async fn garbage_entry_is_a_miss() {
        let (cache, store) = service();
        use crate::ports::CacheStore as _;
        store.put("k", "{not json", 60).await.unwrap();
        assert_eq!(cache.get_conversation("k").await, None);
    }

    #[tokio::test]
    async fn session_snapshot_uses_session_key_and_long_ttl() {
        let (cache, store) = service();
        let session = DiscoverySession::start(
            UserId::new("op").unwrap(),
            "Pizza",
            None,
            RestaurantContext::new(),
            transcript(),
            30,
        )
        .unwrap();

        assert!(cache.put_session(&session).await);
        let key = session_key(session.id());
        assert!(store.ttl(&key).await.unwrap() > Duration::from_secs(6 * 86_400));
        assert_eq!(cache.get_session(session.id()).await, Some(session));
    }

    #[tokio::test]
    async fn invalidated_snapshot_is_gone() {
        let (cache, _) = service();
        let session = DiscoverySession::start(
            UserId::new("op").unwrap(),
            "Pizza",
            None,
            RestaurantContext::new(),
            transcript(),
            30,
        )
        .unwrap();
        cache.put_session(&session).await;

        cache.invalidate_session(session.id()).await;

        assert_eq!(cache.get_session(session.id()).await, None);
    }
}

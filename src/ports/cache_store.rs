//! Cache Store Port - Key-value storage with per-entry expiry.
//!
//! Values are opaque JSON strings. The store owns expiry; callers only pass
//! a TTL on write. Durability is best-effort.

use async_trait::async_trait;

/// Errors raised by cache stores.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheStoreError {
    /// Backend could not be reached or rejected the command.
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    #[error("cache serialization failed: {0}")]
    Serialization(String),
}

impl CacheStoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

/// Port for the key-value cache.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the live value for `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheStoreError>;

    /// Stores `value` under `key` for `ttl_secs` seconds, replacing any prior value.
    async fn put(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheStoreError>;

    /// Removes `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheStoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_store_is_object_safe() {
        fn _accepts_dyn(_store: &dyn CacheStore) {}
    }

    #[test]
    fn errors_display_their_cause() {
        assert_eq!(
            CacheStoreError::unavailable("connection refused").to_string(),
            "cache unavailable: connection refused"
        );
    }
}

//! Redis-backed cache store for multi-server deployments.
//!
//! Entries are plain string keys written with `SET key value EX ttl`, so
//! Redis owns expiry. Every key is namespaced under a configurable prefix.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::ports::{CacheStore, CacheStoreError};

/// Redis cache store.
#[derive(Clone)]
pub struct RedisCacheStore {
    conn: MultiplexedConnection,
    key_prefix: String,
}

impl RedisCacheStore {
    pub fn new(conn: MultiplexedConnection, key_prefix: impl Into<String>) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.into(),
        }
    }

    /// Opens a multiplexed connection to `url`.
    ///
    /// # Errors
    ///
    /// - `Unavailable` if the URL is invalid or the server cannot be reached
    pub async fn connect(url: &str, key_prefix: impl Into<String>) -> Result<Self, CacheStoreError> {
        let client = redis::Client::open(url).map_err(unavailable)?;
        let conn = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(unavailable)?;
        Ok(Self::new(conn, key_prefix))
    }

    fn namespaced(&self, key: &str) -> String {
        namespaced_key(&self.key_prefix, key)
    }
}

fn namespaced_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}:{}", prefix, key)
    }
}

fn unavailable(e: redis::RedisError) -> CacheStoreError {
    CacheStoreError::Unavailable(e.to_string())
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheStoreError> {
        let mut conn = self.conn.clone();
        conn.get(self.namespaced(key)).await.map_err(unavailable)
    }

    async fn put(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheStoreError> {
        let mut conn = self.conn.clone();
        // Redis rejects EX 0.
        conn.set_ex::<_, _, ()>(self.namespaced(key), value, ttl_secs.max(1))
            .await
            .map_err(unavailable)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheStoreError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(self.namespaced(key))
            .await
            .map_err(unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced() {
        assert_eq!(
            namespaced_key("menu_discovery", "discovery:session:abc"),
            "menu_discovery:discovery:session:abc"
        );
        assert_eq!(namespaced_key("", "k"), "k");
    }

    // Integration tests require a running Redis instance:
    //
    // #[tokio::test]
    // #[ignore]
    // async fn redis_round_trip() {
    //     let store = RedisCacheStore::connect("redis://localhost:6379", "test").await.unwrap();
    //     store.put("k", "v", 60).await.unwrap();
    //     assert_eq!(store.get("k").await.unwrap(), Some("v".into()));
    // }
}

//! Cache store adapters.
//!
//! - `InMemoryCacheStore` - Process-local map with lazy expiry
//! - `RedisCacheStore` - Shared Redis cache

mod in_memory;
mod redis;

pub use in_memory::InMemoryCacheStore;
pub use self::redis::RedisCacheStore;

//! Application layer - Services and handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! `DiscoveryService` is the entry point; the cache and similarity services
//! wrap their stores with the degrade-on-failure policy the lifecycle relies on.

pub mod cache;
pub mod errors;
pub mod handlers;
pub mod locks;
pub mod similarity;

pub use cache::{CacheService, CachedConversation};
pub use errors::DiscoveryError;
pub use handlers::{
    DiscoveryService, DiscoveryStream, ProcessResponseCommand, StartDiscoveryCommand, StreamEvent,
};
pub use locks::{SessionGuard, SessionLocks};
pub use similarity::{SimilarityService, DEFAULT_SIMILARITY_THRESHOLD};

//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the discovery domain to external systems:
//! - `ai` - LLM providers (OpenAI-compatible, scripted mock)
//! - `cache` - Key-value caches (in-memory, Redis)
//! - `memory` - In-memory session and extraction stores
//! - `postgres` - PostgreSQL session and extraction stores

pub mod ai;
pub mod cache;
pub mod memory;
pub mod postgres;

pub use ai::{MockAIProvider, MockResponse, OpenAIConfig, OpenAIProvider};
pub use cache::{InMemoryCacheStore, RedisCacheStore};
pub use memory::{InMemoryDiscoverySessionRepository, InMemoryExtractionStore};
pub use postgres::{PostgresDiscoverySessionRepository, PostgresExtractionStore};

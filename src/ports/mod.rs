//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! - `AIProvider` - LLM completion service, streaming and non-streaming
//! - `CacheStore` - Key-value cache with TTL
//! - `DiscoverySessionRepository` - Session persistence keyed by UUID
//! - `ExtractionStore` - Prior extractions for similarity lookups

mod ai_provider;
mod cache_store;
mod extraction_store;
mod session_repository;

pub use ai_provider::{
    AIError, AIProvider, ChatMessage, ChunkStream, CompletionRequest, CompletionResponse,
    FinishReason, ProviderInfo, RequestMetadata, StreamChunk, TokenUsage,
};
pub use cache_store::{CacheStore, CacheStoreError};
pub use extraction_store::{ExtractionStore, ExtractionStoreError};
pub use session_repository::DiscoverySessionRepository;

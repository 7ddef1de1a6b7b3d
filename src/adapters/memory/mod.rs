//! In-memory persistence adapters.

mod extraction_store;
mod session_repository;

pub use extraction_store::InMemoryExtractionStore;
pub use session_repository::InMemoryDiscoverySessionRepository;

//! Extraction Store Port - Prior discovery outcomes for similarity search.
//!
//! One record per fingerprint; writes overwrite. Expiry is the store's job,
//! so `all_live` never returns expired records.

use async_trait::async_trait;

use crate::domain::discovery::StoredExtraction;

/// Errors raised by extraction stores.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionStoreError {
    #[error("extraction store unavailable: {0}")]
    Unavailable(String),

    #[error("extraction serialization failed: {0}")]
    Serialization(String),
}

/// Port for stored extractions.
#[async_trait]
pub trait ExtractionStore: Send + Sync {
    /// Inserts or replaces the record with the same fingerprint.
    async fn upsert(&self, extraction: &StoredExtraction) -> Result<(), ExtractionStoreError>;

    /// Looks up one record by fingerprint.
    async fn find_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<StoredExtraction>, ExtractionStoreError>;

    /// Every unexpired record, the candidate pool for similarity search.
    async fn all_live(&self) -> Result<Vec<StoredExtraction>, ExtractionStoreError>;
}

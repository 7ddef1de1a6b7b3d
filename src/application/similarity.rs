//! Similarity Service - fuzzy lookup over prior extractions.

use std::sync::Arc;

use crate::domain::discovery::{
    similarity, DiscoverySession, ExtractionMetadata, SimilarityMatch, StoredExtraction,
};
use crate::ports::{ExtractionStore, ExtractionStoreError};

/// Threshold applied when callers have no opinion.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 80.0;

/// Scores stored extractions against new item names and records new ones.
#[derive(Clone)]
pub struct SimilarityService {
    store: Arc<dyn ExtractionStore>,
    ttl_days: i64,
}

impl SimilarityService {
    pub fn new(store: Arc<dyn ExtractionStore>, ttl_days: i64) -> Self {
        Self { store, ttl_days }
    }

    /// Prior extractions scoring at least `threshold`, best first.
    ///
    /// Advisory only: a failing store yields no matches.
    pub async fn find_similar(
        &self,
        item_name: &str,
        threshold: f64,
        category: Option<&str>,
    ) -> Vec<SimilarityMatch> {
        let candidates = match self.store.all_live().await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(item = %item_name, error = %e, "Similarity lookup failed, continuing without matches");
                return Vec::new();
            }
        };

        let mut matches: Vec<SimilarityMatch> = candidates
            .iter()
            .filter_map(|stored| {
                let score = similarity(
                    item_name,
                    &stored.item_name,
                    (category, stored.category.as_deref()),
                );
                (score >= threshold).then(|| SimilarityMatch::from_stored(stored, score))
            })
            .collect();

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        tracing::debug!(item = %item_name, matches = matches.len(), "Similarity lookup done");
        matches
    }

    /// Records the outcome of a completed session, replacing any prior
    /// record with the same fingerprint.
    pub async fn store_extraction(
        &self,
        session: &DiscoverySession,
    ) -> Result<StoredExtraction, ExtractionStoreError> {
        let context = session.context();
        let record = StoredExtraction::new(
            session.item_name(),
            session.category().map(str::to_string),
            session.extracted_data().clone(),
            ExtractionMetadata {
                region: context.location.clone(),
                cuisine_type: context.cuisine_type.clone(),
                price_tier: context.price_tier.clone(),
            },
            session.confidence_scores().overall,
            self.ttl_days,
        );

        self.store.upsert(&record).await?;
        Ok(record)
    }
}

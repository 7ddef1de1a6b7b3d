//! In-memory implementation of ExtractionStore.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::discovery::StoredExtraction;
use crate::ports::{ExtractionStore, ExtractionStoreError};

/// Fingerprint-keyed extraction store. Expired records are hidden, not purged.
#[derive(Debug, Clone, Default)]
pub struct InMemoryExtractionStore {
    records: Arc<RwLock<HashMap<String, StoredExtraction>>>,
}

impl InMemoryExtractionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store, replacing records with the same fingerprint.
    pub async fn with_records(self, records: impl IntoIterator<Item = StoredExtraction>) -> Self {
        {
            let mut map = self.records.write().await;
            for record in records {
                map.insert(record.fingerprint.clone(), record);
            }
        }
        self
    }

    /// Number of records, expired ones included.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ExtractionStore for InMemoryExtractionStore {
    async fn upsert(&self, extraction: &StoredExtraction) -> Result<(), ExtractionStoreError> {
        self.records
            .write()
            .await
            .insert(extraction.fingerprint.clone(), extraction.clone());
        Ok(())
    }

    async fn find_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<StoredExtraction>, ExtractionStoreError> {
        Ok(self
            .records
            .read()
            .await
            .get(fingerprint)
            .filter(|r| !r.is_expired())
            .cloned())
    }

    async fn all_live(&self) -> Result<Vec<StoredExtraction>, ExtractionStoreError> {
        let mut live: Vec<StoredExtraction> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| !r.is_expired())
            .cloned()
            .collect();
        live.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(live)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::discovery::{ExtractedData, ExtractionMetadata};

    fn record(name: &str, ttl_days: i64) -> StoredExtraction {
        StoredExtraction::new(
            name,
            Some("pizza".into()),
            ExtractedData::default(),
            ExtractionMetadata::default(),
            0.8,
            ttl_days,
        )
    }

    #[tokio::test]
    async fn upsert_overwrites_same_fingerprint() {
        let store = InMemoryExtractionStore::new();
        let mut first = record("Margherita", 30);
        store.upsert(&first).await.unwrap();
        first.confidence = 0.95;
        store.upsert(&first).await.unwrap();

        assert_eq!(store.len().await, 1);
        let found = store
            .find_by_fingerprint(&first.fingerprint)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.confidence, 0.95);
    }

    #[tokio::test]
    async fn expired_records_are_invisible() {
        let expired = record("Hawaiian", -1);
        let store = InMemoryExtractionStore::new()
            .with_records([expired.clone(), record("Margherita", 30)])
            .await;

        assert_eq!(store.len().await, 2);
        assert!(store
            .find_by_fingerprint(&expired.fingerprint)
            .await
            .unwrap()
            .is_none());
        let live = store.all_live().await.unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].item_name, "Margherita");
    }

    #[tokio::test]
    async fn names_differing_only_in_accents_share_a_record() {
        let store = InMemoryExtractionStore::new();
        store.upsert(&record("Piña Pizza", 30)).await.unwrap();
        store.upsert(&record("pina pizza", 30)).await.unwrap();
        assert_eq!(store.len().await, 1);
    }
}

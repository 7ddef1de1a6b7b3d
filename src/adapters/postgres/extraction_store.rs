//! PostgreSQL implementation of ExtractionStore.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::domain::discovery::{ExtractionMetadata, StoredExtraction};
use crate::domain::foundation::Timestamp;
use crate::ports::{ExtractionStore, ExtractionStoreError};

/// Stored extractions keyed by fingerprint.
#[derive(Clone)]
pub struct PostgresExtractionStore {
    pool: PgPool,
}

impl PostgresExtractionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn unavailable(e: sqlx::Error) -> ExtractionStoreError {
    ExtractionStoreError::Unavailable(e.to_string())
}

fn serialization(e: impl std::fmt::Display) -> ExtractionStoreError {
    ExtractionStoreError::Serialization(e.to_string())
}

#[async_trait]
impl ExtractionStore for PostgresExtractionStore {
    async fn upsert(&self, extraction: &StoredExtraction) -> Result<(), ExtractionStoreError> {
        let data = serde_json::to_value(&extraction.extracted_data).map_err(serialization)?;

        sqlx::query(
            r#"
            INSERT INTO discovery_extractions (
                fingerprint, item_name, normalized_name, category, extracted_data,
                region, cuisine_type, price_tier, confidence, created_at, expires_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (fingerprint) DO UPDATE SET
                item_name = EXCLUDED.item_name,
                extracted_data = EXCLUDED.extracted_data,
                region = EXCLUDED.region,
                cuisine_type = EXCLUDED.cuisine_type,
                price_tier = EXCLUDED.price_tier,
                confidence = EXCLUDED.confidence,
                created_at = EXCLUDED.created_at,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(&extraction.fingerprint)
        .bind(&extraction.item_name)
        .bind(&extraction.normalized_name)
        .bind(extraction.category.as_deref())
        .bind(data)
        .bind(extraction.metadata.region.as_deref())
        .bind(extraction.metadata.cuisine_type.as_deref())
        .bind(extraction.metadata.price_tier.as_deref())
        .bind(extraction.confidence)
        .bind(extraction.created_at.as_datetime())
        .bind(extraction.expires_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(())
    }

    async fn find_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<StoredExtraction>, ExtractionStoreError> {
        let row = sqlx::query(
            r#"
            SELECT * FROM discovery_extractions
            WHERE fingerprint = $1 AND expires_at > NOW()
            "#,
        )
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        row.map(row_to_extraction).transpose()
    }

    async fn all_live(&self) -> Result<Vec<StoredExtraction>, ExtractionStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM discovery_extractions
            WHERE expires_at > NOW()
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        rows.into_iter().map(row_to_extraction).collect()
    }
}

fn row_to_extraction(row: sqlx::postgres::PgRow) -> Result<StoredExtraction, ExtractionStoreError> {
    let data: serde_json::Value = row.try_get("extracted_data").map_err(unavailable)?;
    let created_at: chrono::DateTime<chrono::Utc> = row.try_get("created_at").map_err(unavailable)?;
    let expires_at: chrono::DateTime<chrono::Utc> = row.try_get("expires_at").map_err(unavailable)?;

    Ok(StoredExtraction {
        fingerprint: row.try_get("fingerprint").map_err(unavailable)?,
        item_name: row.try_get("item_name").map_err(unavailable)?,
        normalized_name: row.try_get("normalized_name").map_err(unavailable)?,
        category: row.try_get("category").map_err(unavailable)?,
        extracted_data: serde_json::from_value(data).map_err(serialization)?,
        metadata: ExtractionMetadata {
            region: row.try_get("region").map_err(unavailable)?,
            cuisine_type: row.try_get("cuisine_type").map_err(unavailable)?,
            price_tier: row.try_get("price_tier").map_err(unavailable)?,
        },
        confidence: row.try_get("confidence").map_err(unavailable)?,
        created_at: Timestamp::from_datetime(created_at),
        expires_at: Timestamp::from_datetime(expires_at),
    })
}

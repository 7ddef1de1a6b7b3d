//! PostgreSQL adapters - Database implementations for persistence ports.
//!
//! - `PostgresDiscoverySessionRepository` - Discovery sessions, JSONB transcript
//! - `PostgresExtractionStore` - Completed extractions for similarity search
//!
//! Both expect the tables created by [`ensure_schema`].

mod discovery_session_repository;
mod extraction_store;

pub use discovery_session_repository::PostgresDiscoverySessionRepository;
pub use extraction_store::PostgresExtractionStore;

use sqlx::PgPool;

use crate::domain::foundation::DomainError;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS discovery_sessions (
        id UUID PRIMARY KEY,
        user_id TEXT NOT NULL,
        item_name TEXT NOT NULL,
        item_description TEXT,
        context JSONB NOT NULL,
        messages JSONB NOT NULL,
        extracted_data JSONB NOT NULL,
        confidence_scores JSONB NOT NULL,
        status TEXT NOT NULL,
        message_count INTEGER NOT NULL,
        tokens_used BIGINT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS discovery_sessions_owner_status
        ON discovery_sessions (user_id, status, updated_at DESC)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS discovery_extractions (
        fingerprint TEXT PRIMARY KEY,
        item_name TEXT NOT NULL,
        normalized_name TEXT NOT NULL,
        category TEXT,
        extracted_data JSONB NOT NULL,
        region TEXT,
        cuisine_type TEXT,
        price_tier TEXT,
        confidence DOUBLE PRECISION NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        expires_at TIMESTAMPTZ NOT NULL
    )
    "#,
];

/// Creates the discovery tables if they do not exist.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), DomainError> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to apply schema: {}", e)))?;
    }
    Ok(())
}

//! PostgreSQL implementation of DiscoverySessionRepository.
//!
//! Scalar fields live in columns; the context, transcript, extracted data
//! and confidence scores are stored as JSONB.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::{PgPool, Row};

use crate::domain::discovery::{DiscoverySession, DiscoveryStatus};
use crate::domain::foundation::{DomainError, ErrorCode, SessionId, Timestamp, UserId};
use crate::ports::DiscoverySessionRepository;

const SELECT_COLUMNS: &str = r#"
    SELECT id, user_id, item_name, item_description, context, messages,
           extracted_data, confidence_scores, status, tokens_used,
           created_at, updated_at
    FROM discovery_sessions
"#;

/// PostgreSQL implementation of DiscoverySessionRepository.
#[derive(Clone)]
pub struct PostgresDiscoverySessionRepository {
    pool: PgPool,
}

impl PostgresDiscoverySessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DiscoverySessionRepository for PostgresDiscoverySessionRepository {
    async fn create(&self, session: &DiscoverySession) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO discovery_sessions (
                id, user_id, item_name, item_description, context, messages,
                extracted_data, confidence_scores, status, message_count,
                tokens_used, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(session.id().as_uuid())
        .bind(session.user_id().as_str())
        .bind(session.item_name())
        .bind(session.item_description())
        .bind(to_json(session.context(), "context")?)
        .bind(to_json(session.messages(), "messages")?)
        .bind(to_json(session.extracted_data(), "extracted_data")?)
        .bind(to_json(session.confidence_scores(), "confidence_scores")?)
        .bind(session.status().as_str())
        .bind(session.message_count() as i32)
        .bind(session.tokens_used() as i64)
        .bind(session.created_at().as_datetime())
        .bind(session.updated_at().as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to insert discovery session: {}", e)))?;

        Ok(())
    }

    async fn update(&self, session: &DiscoverySession) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE discovery_sessions SET
                messages = $2,
                extracted_data = $3,
                confidence_scores = $4,
                status = $5,
                message_count = $6,
                tokens_used = $7,
                updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(session.id().as_uuid())
        .bind(to_json(session.messages(), "messages")?)
        .bind(to_json(session.extracted_data(), "extracted_data")?)
        .bind(to_json(session.confidence_scores(), "confidence_scores")?)
        .bind(session.status().as_str())
        .bind(session.message_count() as i32)
        .bind(session.tokens_used() as i64)
        .bind(session.updated_at().as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to update discovery session: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::SessionNotFound,
                format!("Session not found: {}", session.id()),
            ));
        }

        Ok(())
    }

    async fn find_by_id(&self, id: &SessionId) -> Result<Option<DiscoverySession>, DomainError> {
        let row = sqlx::query(&format!("{} WHERE id = $1", SELECT_COLUMNS))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to fetch discovery session: {}", e)))?;

        row.map(row_to_session).transpose()
    }

    async fn find_by_owner_and_status(
        &self,
        user_id: &UserId,
        status: DiscoveryStatus,
    ) -> Result<Vec<DiscoverySession>, DomainError> {
        let rows = sqlx::query(&format!(
            "{} WHERE user_id = $1 AND status = $2 ORDER BY updated_at DESC",
            SELECT_COLUMNS
        ))
        .bind(user_id.as_str())
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to fetch sessions by owner: {}", e)))?;

        rows.into_iter().map(row_to_session).collect()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Helper functions
// ════════════════════════════════════════════════════════════════════════════

fn to_json<T: Serialize + ?Sized>(value: &T, field: &str) -> Result<serde_json::Value, DomainError> {
    serde_json::to_value(value).map_err(|e| {
        DomainError::new(
            ErrorCode::SerializationError,
            format!("Failed to serialize {}: {}", field, e),
        )
    })
}

fn from_json<T: DeserializeOwned>(value: serde_json::Value, field: &str) -> Result<T, DomainError> {
    serde_json::from_value(value).map_err(|e| {
        DomainError::new(
            ErrorCode::SerializationError,
            format!("Failed to deserialize {}: {}", field, e),
        )
    })
}

fn column<'r, T>(row: &'r sqlx::postgres::PgRow, name: &str) -> Result<T, DomainError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(|e| DomainError::database(format!("Failed to get {}: {}", name, e)))
}

fn row_to_session(row: sqlx::postgres::PgRow) -> Result<DiscoverySession, DomainError> {
    let id: uuid::Uuid = column(&row, "id")?;
    let user_id: String = column(&row, "user_id")?;
    let status: String = column(&row, "status")?;
    let tokens_used: i64 = column(&row, "tokens_used")?;
    let created_at: chrono::DateTime<chrono::Utc> = column(&row, "created_at")?;
    let updated_at: chrono::DateTime<chrono::Utc> = column(&row, "updated_at")?;

    Ok(DiscoverySession::reconstitute(
        SessionId::from_uuid(id),
        UserId::new(user_id)
            .map_err(|e| DomainError::database(format!("Invalid user_id: {}", e)))?,
        column(&row, "item_name")?,
        column(&row, "item_description")?,
        from_json(column(&row, "context")?, "context")?,
        from_json(column(&row, "messages")?, "messages")?,
        from_json(column(&row, "extracted_data")?, "extracted_data")?,
        from_json(column(&row, "confidence_scores")?, "confidence_scores")?,
        str_to_status(&status)?,
        tokens_used.max(0) as u64,
        Timestamp::from_datetime(created_at),
        Timestamp::from_datetime(updated_at),
    ))
}

fn str_to_status(s: &str) -> Result<DiscoveryStatus, DomainError> {
    s.parse()
        .map_err(|_| DomainError::database(format!("Invalid discovery status: {}", s)))
}

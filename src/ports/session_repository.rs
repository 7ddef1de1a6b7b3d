//! Discovery session repository port.
//!
//! Defines the contract for persisting and retrieving DiscoverySession
//! aggregates. Sessions are keyed by UUID and replaced wholesale on update.

use async_trait::async_trait;

use crate::domain::discovery::{DiscoverySession, DiscoveryStatus};
use crate::domain::foundation::{DomainError, SessionId, UserId};

/// Repository port for DiscoverySession persistence.
#[async_trait]
pub trait DiscoverySessionRepository: Send + Sync {
    /// Save a new session.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` on persistence failure
    async fn create(&self, session: &DiscoverySession) -> Result<(), DomainError>;

    /// Replace an existing session.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound` if session doesn't exist
    /// - `DatabaseError` on persistence failure
    async fn update(&self, session: &DiscoverySession) -> Result<(), DomainError>;

    /// Find a session by its ID. Returns `None` if not found.
    async fn find_by_id(&self, id: &SessionId) -> Result<Option<DiscoverySession>, DomainError>;

    /// Sessions of one owner in one status, most recently updated first.
    async fn find_by_owner_and_status(
        &self,
        user_id: &UserId,
        status: DiscoveryStatus,
    ) -> Result<Vec<DiscoverySession>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_session_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn DiscoverySessionRepository) {}
    }
}

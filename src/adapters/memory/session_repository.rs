//! In-memory implementation of DiscoverySessionRepository.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::discovery::{DiscoverySession, DiscoveryStatus};
use crate::domain::foundation::{DomainError, ErrorCode, SessionId, UserId};
use crate::ports::DiscoverySessionRepository;

/// Process-local session store, used in tests and the operator console.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDiscoverySessionRepository {
    sessions: Arc<RwLock<HashMap<SessionId, DiscoverySession>>>,
}

impl InMemoryDiscoverySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl DiscoverySessionRepository for InMemoryDiscoverySessionRepository {
    async fn create(&self, session: &DiscoverySession) -> Result<(), DomainError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(session.id()) {
            return Err(DomainError::database(format!(
                "Session already exists: {}",
                session.id()
            )));
        }
        sessions.insert(*session.id(), session.clone());
        Ok(())
    }

    async fn update(&self, session: &DiscoverySession) -> Result<(), DomainError> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(session.id()) {
            Some(stored) => {
                *stored = session.clone();
                Ok(())
            }
            None => Err(DomainError::new(
                ErrorCode::SessionNotFound,
                format!("Session not found: {}", session.id()),
            )),
        }
    }

    async fn find_by_id(&self, id: &SessionId) -> Result<Option<DiscoverySession>, DomainError> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn find_by_owner_and_status(
        &self,
        user_id: &UserId,
        status: DiscoveryStatus,
    ) -> Result<Vec<DiscoverySession>, DomainError> {
        let mut found: Vec<DiscoverySession> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| s.user_id() == user_id && s.status() == status)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.updated_at().cmp(a.updated_at()));
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::discovery::{Message, RestaurantContext};

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    fn session_for(owner: &str, item: &str) -> DiscoverySession {
        DiscoverySession::start(
            user(owner),
            item,
            None,
            RestaurantContext::new(),
            vec![Message::system("sys"), Message::user("hi", None), Message::assistant("hello")],
            30,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn create_then_find_returns_equal_session() {
        let repo = InMemoryDiscoverySessionRepository::new();
        let session = session_for("op-1", "Burger");
        repo.create(&session).await.unwrap();

        let found = repo.find_by_id(session.id()).await.unwrap();
        assert_eq!(found, Some(session));
    }

    #[tokio::test]
    async fn create_rejects_duplicate_id() {
        let repo = InMemoryDiscoverySessionRepository::new();
        let session = session_for("op-1", "Burger");
        repo.create(&session).await.unwrap();
        assert!(repo.create(&session).await.is_err());
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn find_missing_returns_none() {
        let repo = InMemoryDiscoverySessionRepository::new();
        assert!(repo.find_by_id(&SessionId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_replaces_stored_copy() {
        let repo = InMemoryDiscoverySessionRepository::new();
        let mut session = session_for("op-1", "Burger");
        repo.create(&session).await.unwrap();

        session.abandon().unwrap();
        repo.update(&session).await.unwrap();

        let found = repo.find_by_id(session.id()).await.unwrap().unwrap();
        assert_eq!(found.status(), DiscoveryStatus::Abandoned);
    }

    #[tokio::test]
    async fn update_missing_session_fails_with_not_found() {
        let repo = InMemoryDiscoverySessionRepository::new();
        let err = repo.update(&session_for("op-1", "Burger")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::SessionNotFound);
    }

    #[tokio::test]
    async fn find_by_owner_and_status_filters_and_orders() {
        let repo = InMemoryDiscoverySessionRepository::new();
        let older = session_for("op-1", "Pizza");
        repo.create(&older).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let newer = session_for("op-1", "Burger");
        repo.create(&newer).await.unwrap();

        let mut abandoned = session_for("op-1", "Soup");
        abandoned.abandon().unwrap();
        repo.create(&abandoned).await.unwrap();
        repo.create(&session_for("op-2", "Salad")).await.unwrap();

        let active = repo
            .find_by_owner_and_status(&user("op-1"), DiscoveryStatus::Active)
            .await
            .unwrap();
        let names: Vec<_> = active.iter().map(|s| s.item_name()).collect();
        assert_eq!(names, vec!["Burger", "Pizza"]);
    }
}

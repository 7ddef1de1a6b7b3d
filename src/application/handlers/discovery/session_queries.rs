//! Reads, resumption and abandonment.

use super::DiscoveryService;
use crate::application::errors::DiscoveryError;
use crate::domain::discovery::{ConversationContext, DiscoverySession, DiscoveryStatus};
use crate::domain::foundation::{SessionId, UserId};

impl DiscoveryService {
    /// Where a session stands, with the phase derived from its transcript.
    ///
    /// The repository is authoritative. The cached snapshot is only served
    /// when the repository cannot be reached.
    pub async fn get_conversation_context(
        &self,
        session_id: SessionId,
    ) -> Result<ConversationContext, DiscoveryError> {
        let session = match self.sessions.find_by_id(&session_id).await {
            Ok(Some(session)) => session,
            Ok(None) => return Err(DiscoveryError::SessionNotFound(session_id)),
            Err(e) => match self.cache.get_session(&session_id).await {
                Some(snapshot) => {
                    tracing::warn!(
                        session_id = %session_id,
                        error = %e,
                        "Session store unavailable, serving cached snapshot"
                    );
                    snapshot
                }
                None => return Err(DiscoveryError::Persistence(e)),
            },
        };
        Ok(ConversationContext::from_session(&session))
    }

    /// Picks a session back up. Same view as [`Self::get_conversation_context`].
    pub async fn resume_session(
        &self,
        session_id: SessionId,
    ) -> Result<ConversationContext, DiscoveryError> {
        self.get_conversation_context(session_id).await
    }

    /// Marks a session abandoned. Abandoning twice is a no-op.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound` if the session does not exist
    /// - `SessionNotActive` if it was completed
    pub async fn abandon_session(
        &self,
        session_id: SessionId,
    ) -> Result<DiscoverySession, DiscoveryError> {
        let _guard = self.locks.lock(&session_id).await;
        let mut session = self.load(&session_id).await?;

        let changed = session
            .abandon()
            .map_err(|_| DiscoveryError::not_active(session_id, session.status()))?;
        if changed {
            self.persist(&session).await?;
            tracing::info!(session_id = %session_id, "Discovery abandoned");
        }
        Ok(session)
    }

    /// The owner's active sessions, most recently updated first.
    pub async fn get_user_active_sessions(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<DiscoverySession>, DiscoveryError> {
        self.sessions
            .find_by_owner_and_status(user_id, DiscoveryStatus::Active)
            .await
            .map_err(DiscoveryError::Persistence)
    }
}

//! Closing a discovery session with a consolidated result.

use super::DiscoveryService;
use crate::application::errors::DiscoveryError;
use crate::domain::discovery::DiscoverySession;
use crate::domain::foundation::SessionId;

impl DiscoveryService {
    /// Consolidates the extracted data, scores it and marks the session
    /// completed. The outcome is then recorded for similarity lookups;
    /// failing to record it is logged and does not fail the call.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound` if the session does not exist
    /// - `SessionNotActive` if it was already completed or abandoned
    /// - `Persistence` if the session cannot be saved
    pub async fn complete_discovery(
        &self,
        session_id: SessionId,
    ) -> Result<DiscoverySession, DiscoveryError> {
        let _guard = self.locks.lock(&session_id).await;
        let mut session = self.load_active(&session_id).await?;

        session.complete()?;
        self.persist(&session).await?;

        match self.similarity.store_extraction(&session).await {
            Ok(stored) => tracing::debug!(
                session_id = %session_id,
                fingerprint = %stored.fingerprint,
                "Extraction stored"
            ),
            Err(e) => tracing::warn!(
                session_id = %session_id,
                error = %e,
                "Failed to store extraction for similarity lookups"
            ),
        }

        tracing::info!(
            session_id = %session_id,
            overall_confidence = session.confidence_scores().overall,
            tokens = session.tokens_used(),
            "Discovery completed"
        );
        Ok(session)
    }
}

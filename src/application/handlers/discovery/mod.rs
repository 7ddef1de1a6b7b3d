//! Discovery lifecycle: start, turns, streaming, completion, abandonment.
//!
//! `DiscoveryService` owns every mutation of a `DiscoverySession`. Each
//! operation lives in its own file as an `impl DiscoveryService` block.
//!
//! Mutating operations hold the session's lock across the whole
//! load-call-persist cycle, and persist only after the completion call
//! succeeded, so a failed turn leaves no trace.

mod complete_discovery;
mod process_response;
mod session_queries;
mod start_discovery;
mod stream_response;

pub use process_response::ProcessResponseCommand;
pub use start_discovery::StartDiscoveryCommand;
pub use stream_response::{DiscoveryStream, StreamEvent};

use std::sync::Arc;

use crate::application::cache::CacheService;
use crate::application::errors::DiscoveryError;
use crate::application::locks::SessionLocks;
use crate::application::similarity::SimilarityService;
use crate::config::DiscoveryConfig;
use crate::domain::discovery::{
    phase_prompt, DiscoveryPhase, DiscoverySession, ExtractionEngine, MessageRole, UserSelections,
};
use crate::domain::foundation::{SessionId, UserId};
use crate::ports::{
    AIProvider, CacheStore, ChatMessage, CompletionRequest, DiscoverySessionRepository,
    ExtractionStore, RequestMetadata,
};

/// The session lifecycle manager.
pub struct DiscoveryService {
    ai: Arc<dyn AIProvider>,
    sessions: Arc<dyn DiscoverySessionRepository>,
    cache: CacheService,
    similarity: SimilarityService,
    extractor: ExtractionEngine,
    locks: SessionLocks,
    config: DiscoveryConfig,
}

impl DiscoveryService {
    pub fn new(
        ai: Arc<dyn AIProvider>,
        sessions: Arc<dyn DiscoverySessionRepository>,
        cache_store: Arc<dyn CacheStore>,
        extraction_store: Arc<dyn ExtractionStore>,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            ai,
            sessions,
            cache: CacheService::new(cache_store, config.cache_policy()),
            similarity: SimilarityService::new(extraction_store, config.stored_extraction_ttl_days),
            extractor: ExtractionEngine::new(),
            locks: SessionLocks::new(),
            config,
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub fn cache(&self) -> &CacheService {
        &self.cache
    }

    pub fn similarity(&self) -> &SimilarityService {
        &self.similarity
    }

    /// Loads a session from the repository.
    async fn load(&self, id: &SessionId) -> Result<DiscoverySession, DiscoveryError> {
        self.sessions
            .find_by_id(id)
            .await
            .map_err(DiscoveryError::Persistence)?
            .ok_or(DiscoveryError::SessionNotFound(*id))
    }

    /// Loads a session that must still accept turns.
    async fn load_active(&self, id: &SessionId) -> Result<DiscoverySession, DiscoveryError> {
        let session = self.load(id).await?;
        if !session.status().is_active() {
            return Err(DiscoveryError::not_active(*id, session.status()));
        }
        Ok(session)
    }

    /// Writes a mutated session through to the repository and the snapshot cache.
    async fn persist(&self, session: &DiscoverySession) -> Result<(), DiscoveryError> {
        self.sessions
            .update(session)
            .await
            .map_err(DiscoveryError::Persistence)?;
        self.cache.put_session(session).await;
        Ok(())
    }
}

/// Completion request for one turn: the stored transcript followed by the
/// phase-framed version of the operator's input.
fn turn_request(
    session: &DiscoverySession,
    phase: DiscoveryPhase,
    user_input: &str,
    selections: Option<&UserSelections>,
) -> CompletionRequest {
    let prompt = phase_prompt(
        phase,
        session.item_name(),
        user_input,
        selections,
        session.extracted_data(),
    );

    CompletionRequest::new(request_metadata(session.user_id(), Some(*session.id())))
        .with_messages(session.messages().iter().map(ChatMessage::from))
        .with_message(MessageRole::User, prompt)
}

fn request_metadata(user_id: &UserId, session_id: Option<SessionId>) -> RequestMetadata {
    RequestMetadata::new(user_id.clone(), session_id, uuid::Uuid::new_v4().to_string())
}

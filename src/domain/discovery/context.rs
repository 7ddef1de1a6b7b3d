//! Read model handed back to callers after each turn.

use serde::{Deserialize, Serialize};

use super::extracted::ExtractedData;
use super::message::InteractiveElement;
use super::phase::DiscoveryPhase;
use super::session::{DiscoverySession, DiscoveryStatus};
use crate::domain::foundation::SessionId;

/// Snapshot of where a discovery conversation stands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub session_id: SessionId,
    pub status: DiscoveryStatus,
    pub phase: DiscoveryPhase,
    pub item_name: String,
    pub item_description: Option<String>,
    pub category: Option<String>,
    pub collected_data: ExtractedData,
    pub user_utterances: Vec<String>,
    /// Messages in the transcript, system prompt included.
    pub interaction_count: usize,
    pub last_user_input: Option<String>,
    /// Latest assistant reply, i.e. the question the operator answers next.
    pub next_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interactive_elements: Vec<InteractiveElement>,
    pub tokens_used: u64,
}

impl ConversationContext {
    /// Builds the snapshot, reporting `phase` as the active phase.
    pub fn new(session: &DiscoverySession, phase: DiscoveryPhase) -> Self {
        let utterances: Vec<String> = session
            .user_utterances()
            .into_iter()
            .map(str::to_string)
            .collect();
        let reply = session.last_assistant_reply();

        Self {
            session_id: *session.id(),
            status: session.status(),
            phase,
            item_name: session.item_name().to_string(),
            item_description: session.item_description().map(str::to_string),
            category: session.category().map(str::to_string),
            collected_data: session.extracted_data().clone(),
            interaction_count: session.message_count(),
            last_user_input: session.last_user_input().map(str::to_string),
            user_utterances: utterances,
            next_prompt: reply.map(|m| m.content.clone()),
            interactive_elements: reply
                .map(|m| m.interactive_elements.clone())
                .unwrap_or_default(),
            tokens_used: session.tokens_used(),
        }
    }

    /// Snapshot at rest, with the phase derived from the transcript.
    pub fn from_session(session: &DiscoverySession) -> Self {
        Self::new(session, session.current_phase())
    }
}

//! Processing one operator turn.

use super::{turn_request, DiscoveryService};
use crate::application::errors::DiscoveryError;
use crate::domain::discovery::{ConversationContext, ExtractedData, Message, UserSelections};
use crate::domain::foundation::SessionId;

/// Command carrying the operator's answer to the latest assistant message.
#[derive(Debug, Clone)]
pub struct ProcessResponseCommand {
    pub session_id: SessionId,
    pub response: String,
    pub selections: Option<UserSelections>,
}

impl ProcessResponseCommand {
    pub fn new(session_id: SessionId, response: impl Into<String>) -> Self {
        Self {
            session_id,
            response: response.into(),
            selections: None,
        }
    }

    pub fn with_selections(mut self, selections: UserSelections) -> Self {
        self.selections = Some(selections);
        self
    }
}

impl DiscoveryService {
    /// Runs one turn: phase, prompt, completion, extraction, persist.
    ///
    /// The returned context reports the phase this turn ran in. Extraction
    /// scans the last `extraction_window` messages and writes only the
    /// field that phase owns.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound` if the session does not exist
    /// - `SessionNotActive` if it was completed or abandoned
    /// - `AIProvider` if the completion call fails; nothing is persisted
    /// - `Persistence` if the updated session cannot be saved
    pub async fn process_user_response(
        &self,
        cmd: ProcessResponseCommand,
    ) -> Result<ConversationContext, DiscoveryError> {
        let _guard = self.locks.lock(&cmd.session_id).await;
        let mut session = self.load_active(&cmd.session_id).await?;

        let phase = session.phase_for_next_turn();
        let request = turn_request(&session, phase, &cmd.response, cmd.selections.as_ref());
        let response = self.ai.complete(request).await?;

        let user = Message::user(cmd.response, cmd.selections);
        let assistant = Message::assistant(response.content);

        let extracted = if phase.extracts_data() {
            let window = self.config.extraction_window;
            let mut recent: Vec<Message> = {
                let messages = session.messages();
                messages[messages.len().saturating_sub(window)..].to_vec()
            };
            recent.push(user.clone());
            recent.push(assistant.clone());
            self.extractor.extract_for_phase(phase, &recent, window)
        } else {
            ExtractedData::default()
        };

        tracing::debug!(
            session_id = %cmd.session_id,
            phase = ?phase,
            variants = extracted.variants().len(),
            modifiers = extracted.modifiers().len(),
            has_metadata = extracted.has_metadata(),
            "Turn extracted"
        );

        session.record_turn(
            user,
            assistant,
            extracted,
            u64::from(response.usage.total_tokens),
        )?;
        self.persist(&session).await?;

        Ok(ConversationContext::new(&session, phase))
    }
}

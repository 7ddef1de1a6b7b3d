//! Discovery session aggregate.
//!
//! A session owns the transcript, the extracted data and the usage counters
//! for one item. Only the lifecycle service mutates it.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::cache_key::CacheKeyParams;
use super::extracted::{ConfidenceScores, ExtractedData};
use super::message::{Message, MessageRole};
use super::phase::DiscoveryPhase;
use crate::domain::foundation::{
    DomainError, ErrorCode, SessionId, Timestamp, UserId, ValidationError,
};

/// Lifecycle status of a discovery session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryStatus {
    #[default]
    Active,
    Completed,
    Abandoned,
}

impl DiscoveryStatus {
    /// Only active sessions move, and only to a terminal state.
    pub fn can_transition_to(&self, target: &DiscoveryStatus) -> bool {
        use DiscoveryStatus::*;
        matches!((self, target), (Active, Completed) | (Active, Abandoned))
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for DiscoveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscoveryStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "abandoned" => Ok(Self::Abandoned),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown discovery status '{}'", other),
            )),
        }
    }
}

/// `extra` key that asks for a fresh opening instead of a cached one.
pub const FORCE_REFRESH_KEY: &str = "force_refresh";

/// `extra` keys that steer the engine rather than describe the restaurant.
const CONTROL_KEYS: &[&str] = &[FORCE_REFRESH_KEY];

/// Free-form description of the restaurant an item belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestaurantContext {
    #[serde(default)]
    pub cuisine_type: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub price_tier: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl RestaurantContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cuisine_type(mut self, value: impl Into<String>) -> Self {
        self.cuisine_type = Some(value.into());
        self
    }

    pub fn with_location(mut self, value: impl Into<String>) -> Self {
        self.location = Some(value.into());
        self
    }

    pub fn with_price_tier(mut self, value: impl Into<String>) -> Self {
        self.price_tier = Some(value.into());
        self
    }

    pub fn with_category(mut self, value: impl Into<String>) -> Self {
        self.category = Some(value.into());
        self
    }

    pub fn with_language(mut self, value: impl Into<String>) -> Self {
        self.language = Some(value.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// `extra` entries that describe the restaurant, control keys left out.
    pub fn descriptive_extras(&self) -> impl Iterator<Item = (&str, &str)> {
        self.extra
            .iter()
            .filter(|(key, _)| !CONTROL_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Cache-key parameters for an item offered in this context.
    pub fn cache_params(&self, item_name: &str, description: Option<&str>) -> CacheKeyParams {
        CacheKeyParams {
            item_name: item_name.to_string(),
            description: description.map(str::to_string),
            cuisine_type: self.cuisine_type.clone(),
            location: self.location.clone(),
            price_tier: self.price_tier.clone(),
            language: self.language.clone(),
            force_refresh: self
                .extra
                .get(FORCE_REFRESH_KEY)
                .is_some_and(|v| matches!(v.as_str(), "true" | "1" | "yes")),
        }
    }
}

/// A conversation that elicits structured data for one menu item.
///
/// # Invariants
///
/// - `item_name` is non-empty
/// - `message_count` equals the transcript length
/// - `tokens_used` never decreases
/// - only `Active` sessions accept turns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoverySession {
    id: SessionId,
    user_id: UserId,
    item_name: String,
    item_description: Option<String>,
    context: RestaurantContext,
    messages: Vec<Message>,
    extracted_data: ExtractedData,
    confidence_scores: ConfidenceScores,
    status: DiscoveryStatus,
    message_count: usize,
    tokens_used: u64,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl DiscoverySession {
    /// Creates an active session from an opening transcript.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if the item name is blank
    pub fn start(
        user_id: UserId,
        item_name: impl Into<String>,
        item_description: Option<String>,
        context: RestaurantContext,
        transcript: Vec<Message>,
        tokens_used: u64,
    ) -> Result<Self, DomainError> {
        let item_name = item_name.into();
        if item_name.trim().is_empty() {
            return Err(DomainError::new(
                ErrorCode::ValidationFailed,
                "Item name cannot be empty",
            ));
        }

        let now = Timestamp::now();
        Ok(Self {
            id: SessionId::new(),
            user_id,
            item_name,
            item_description: item_description.filter(|d| !d.trim().is_empty()),
            context,
            message_count: transcript.len(),
            messages: transcript,
            extracted_data: ExtractedData::default(),
            confidence_scores: ConfidenceScores::default(),
            status: DiscoveryStatus::Active,
            tokens_used,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuilds a session from storage without validation.
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: SessionId,
        user_id: UserId,
        item_name: String,
        item_description: Option<String>,
        context: RestaurantContext,
        messages: Vec<Message>,
        extracted_data: ExtractedData,
        confidence_scores: ConfidenceScores,
        status: DiscoveryStatus,
        tokens_used: u64,
        created_at: Timestamp,
        updated_at: Timestamp,
    ) -> Self {
        Self {
            id,
            user_id,
            item_name,
            item_description,
            context,
            message_count: messages.len(),
            messages,
            extracted_data,
            confidence_scores,
            status,
            tokens_used,
            created_at,
            updated_at,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn item_name(&self) -> &str {
        &self.item_name
    }

    pub fn item_description(&self) -> Option<&str> {
        self.item_description.as_deref()
    }

    pub fn context(&self) -> &RestaurantContext {
        &self.context
    }

    /// Declared category of the item, if the context names one.
    pub fn category(&self) -> Option<&str> {
        self.context.category.as_deref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn extracted_data(&self) -> &ExtractedData {
        &self.extracted_data
    }

    pub fn confidence_scores(&self) -> &ConfidenceScores {
        &self.confidence_scores
    }

    pub fn status(&self) -> DiscoveryStatus {
        self.status
    }

    pub fn message_count(&self) -> usize {
        self.message_count
    }

    pub fn tokens_used(&self) -> u64 {
        self.tokens_used
    }

    pub fn created_at(&self) -> &Timestamp {
        &self.created_at
    }

    pub fn updated_at(&self) -> &Timestamp {
        &self.updated_at
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Derived views
    // ─────────────────────────────────────────────────────────────────────────

    /// Phase of the transcript as it stands.
    pub fn current_phase(&self) -> DiscoveryPhase {
        DiscoveryPhase::determine(self.message_count, &self.extracted_data)
    }

    /// Phase the next turn runs in, once its user message is appended.
    pub fn phase_for_next_turn(&self) -> DiscoveryPhase {
        DiscoveryPhase::determine(self.message_count + 1, &self.extracted_data)
    }

    /// Every operator utterance, oldest first.
    pub fn user_utterances(&self) -> Vec<&str> {
        self.messages
            .iter()
            .filter(|m| m.is_user())
            .map(|m| m.content.as_str())
            .collect()
    }

    pub fn last_user_input(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.is_user())
            .map(|m| m.content.as_str())
    }

    /// Content of the latest assistant reply.
    pub fn last_assistant_reply(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Appends one completed turn and folds in what it yielded.
    ///
    /// # Errors
    ///
    /// - `InvalidStateTransition` if the session is not active
    pub fn record_turn(
        &mut self,
        user: Message,
        assistant: Message,
        extracted: ExtractedData,
        tokens: u64,
    ) -> Result<(), DomainError> {
        self.ensure_active()?;

        self.messages.push(user);
        self.messages.push(assistant);
        self.message_count += 2;
        self.extracted_data.merge(extracted);
        self.tokens_used = self.tokens_used.saturating_add(tokens);
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Consolidates the extracted data, scores it and closes the session.
    ///
    /// # Errors
    ///
    /// - `InvalidStateTransition` if the session is not active
    pub fn complete(&mut self) -> Result<(), DomainError> {
        self.transition_to(DiscoveryStatus::Completed)?;
        self.extracted_data = self.extracted_data.consolidated();
        self.confidence_scores = ConfidenceScores::compute(&self.extracted_data);
        Ok(())
    }

    /// Marks the session abandoned. Returns false if it already was.
    ///
    /// # Errors
    ///
    /// - `InvalidStateTransition` if the session was completed
    pub fn abandon(&mut self) -> Result<bool, DomainError> {
        if self.status == DiscoveryStatus::Abandoned {
            return Ok(false);
        }
        self.transition_to(DiscoveryStatus::Abandoned)?;
        Ok(true)
    }

    /// Replaces the extracted data wholesale, as an external correction.
    pub fn replace_extracted_data(&mut self, data: ExtractedData) -> Result<(), DomainError> {
        self.ensure_active()?;
        self.extracted_data = data;
        self.updated_at = Timestamp::now();
        Ok(())
    }

    fn transition_to(&mut self, target: DiscoveryStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(&target) {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Cannot move discovery session from {} to {}", self.status, target),
            ));
        }
        self.status = target;
        self.updated_at = Timestamp::now();
        Ok(())
    }

    fn ensure_active(&self) -> Result<(), DomainError> {
        if self.status.is_active() {
            Ok(())
        } else {
            Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Discovery session is {}", self.status),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::discovery::extracted::fixtures::{modifier, variant};

    fn user() -> UserId {
        UserId::new("operator-1").unwrap()
    }

    fn opening() -> Vec<Message> {
        vec![
            Message::system("You are a menu analyst"),
            Message::user("Tell me about Margherita Pizza", None),
            Message::assistant("What sizes do you offer?"),
        ]
    }

    fn session() -> DiscoverySession {
        DiscoverySession::start(
            user(),
            "Margherita Pizza",
            None,
            RestaurantContext::new().with_cuisine_type("Italian"),
            opening(),
            120,
        )
        .unwrap()
    }

    mod status {
        use super::*;

        #[test]
        fn only_active_moves_to_terminal_states() {
            use DiscoveryStatus::*;
            assert!(Active.can_transition_to(&Completed));
            assert!(Active.can_transition_to(&Abandoned));
            assert!(!Completed.can_transition_to(&Abandoned));
            assert!(!Abandoned.can_transition_to(&Active));
            assert!(!Active.can_transition_to(&Active));
        }

        #[test]
        fn parses_its_own_display() {
            for status in [
                DiscoveryStatus::Active,
                DiscoveryStatus::Completed,
                DiscoveryStatus::Abandoned,
            ] {
                assert_eq!(status.to_string().parse::<DiscoveryStatus>().unwrap(), status);
            }
            assert!("archived".parse::<DiscoveryStatus>().is_err());
        }
    }

    mod creation {
        use super::*;

        #[test]
        fn start_counts_opening_transcript() {
            let session = session();
            assert_eq!(session.message_count(), 3);
            assert_eq!(session.tokens_used(), 120);
            assert_eq!(session.status(), DiscoveryStatus::Active);
            assert_eq!(session.current_phase(), DiscoveryPhase::Initial);
            assert_eq!(session.phase_for_next_turn(), DiscoveryPhase::Variants);
        }

        #[test]
        fn blank_item_name_is_rejected() {
            let result = DiscoverySession::start(
                user(),
                "  ",
                None,
                RestaurantContext::new(),
                opening(),
                0,
            );
            assert_eq!(result.unwrap_err().code, ErrorCode::ValidationFailed);
        }

        #[test]
        fn blank_description_is_dropped() {
            let session = DiscoverySession::start(
                user(),
                "Taco",
                Some(" ".into()),
                RestaurantContext::new(),
                opening(),
                0,
            )
            .unwrap();
            assert!(session.item_description().is_none());
        }
    }

    mod turns {
        use super::*;

        #[test]
        fn record_turn_appends_two_messages_and_merges() {
            let mut session = session();
            session
                .record_turn(
                    Message::user("small and large", None),
                    Message::assistant("Any toppings?"),
                    ExtractedData {
                        variants: Some(vec![variant("small", 0.9)]),
                        ..Default::default()
                    },
                    50,
                )
                .unwrap();

            assert_eq!(session.message_count(), 5);
            assert_eq!(session.messages().len(), 5);
            assert_eq!(session.tokens_used(), 170);
            assert!(session.extracted_data().has_variants());
            assert!(session.extracted_data().modifiers.is_none());
            assert_eq!(session.last_user_input(), Some("small and large"));
            assert_eq!(
                session.user_utterances(),
                vec!["Tell me about Margherita Pizza", "small and large"]
            );
        }

        #[test]
        fn closed_sessions_reject_turns() {
            let mut session = session();
            session.abandon().unwrap();
            let err = session
                .record_turn(
                    Message::user("hi", None),
                    Message::assistant("hello"),
                    ExtractedData::default(),
                    1,
                )
                .unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidStateTransition);
            assert_eq!(session.message_count(), 3);
        }
    }

    mod closing {
        use super::*;

        #[test]
        fn complete_consolidates_and_scores() {
            let mut session = session();
            session
                .replace_extracted_data(ExtractedData {
                    variants: Some(vec![variant("small", 0.8), variant("large", 0.9)]),
                    modifiers: Some(vec![modifier("sauces", "ranch", 0.85)]),
                    metadata: None,
                })
                .unwrap();

            session.complete().unwrap();

            assert_eq!(session.status(), DiscoveryStatus::Completed);
            assert_eq!(session.extracted_data().variants()[0].name, "large");
            let overall = session.confidence_scores().overall;
            assert!((overall - (0.85 + 0.85 + 0.0) / 3.0).abs() < 1e-9);
        }

        #[test]
        fn abandon_is_idempotent_but_not_after_completion() {
            let mut session = session();
            assert!(session.abandon().unwrap());
            assert!(!session.abandon().unwrap());

            let mut completed = self::session();
            completed.complete().unwrap();
            assert!(completed.abandon().is_err());
            assert!(completed.complete().is_err());
        }
    }

    mod context {
        use super::*;

        #[test]
        fn cache_params_carry_context_fields() {
            let ctx = RestaurantContext::new()
                .with_cuisine_type("Italian")
                .with_price_tier("premium")
                .with_extra("force_refresh", "true");
            let params = ctx.cache_params("Lasagna", Some("Beef"));
            assert_eq!(params.cuisine_type.as_deref(), Some("Italian"));
            assert_eq!(params.description.as_deref(), Some("Beef"));
            assert!(params.force_refresh);
        }
    }
}

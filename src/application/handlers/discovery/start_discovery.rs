//! Opening a discovery session.

use super::{request_metadata, DiscoveryService};
use crate::application::cache::CachedConversation;
use crate::application::errors::DiscoveryError;
use crate::domain::discovery::{
    initial_user_prompt, system_prompt, DiscoverySession, Message, MessageRole,
    RestaurantContext,
};
use crate::domain::foundation::UserId;
use crate::ports::CompletionRequest;

/// Command to open a discovery conversation for one menu item.
#[derive(Debug, Clone)]
pub struct StartDiscoveryCommand {
    pub user_id: UserId,
    pub item_name: String,
    pub item_description: Option<String>,
    pub context: RestaurantContext,
}

impl StartDiscoveryCommand {
    pub fn new(user_id: UserId, item_name: impl Into<String>, context: RestaurantContext) -> Self {
        Self {
            user_id,
            item_name: item_name.into(),
            item_description: None,
            context,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.item_description = Some(description.into());
        self
    }
}

impl DiscoveryService {
    /// Opens a session, reusing a cached opening transcript when one exists.
    ///
    /// On a cache hit no completion call is made and the session starts
    /// with zero tokens used. On a miss the opening exchange is generated,
    /// cached under the derived key, and the session is persisted only
    /// after the completion call succeeded.
    ///
    /// # Errors
    ///
    /// - `Validation` if the item name is blank
    /// - `SessionCreation` if the completion call fails
    /// - `Persistence` if the session cannot be saved
    pub async fn start_discovery(
        &self,
        cmd: StartDiscoveryCommand,
    ) -> Result<DiscoverySession, DiscoveryError> {
        if cmd.item_name.trim().is_empty() {
            return Err(DiscoveryError::Validation("Item name cannot be empty".into()));
        }
        let description = cmd
            .item_description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty());

        let params = cmd.context.cache_params(&cmd.item_name, description);
        let cache_key = self.cache.derive_key(&params);

        if self.cache.should_use_cache(&params) {
            if let Some(cached) = self.cache.get_conversation(&cache_key).await {
                let session = DiscoverySession::start(
                    cmd.user_id,
                    cmd.item_name,
                    cmd.item_description,
                    cmd.context,
                    cached.transcript,
                    0,
                )?;
                self.sessions
                    .create(&session)
                    .await
                    .map_err(DiscoveryError::Persistence)?;
                self.cache.put_session(&session).await;

                tracing::info!(
                    session_id = %session.id(),
                    cache_key = %cache_key,
                    "Discovery started from cached conversation"
                );
                return Ok(session);
            }
        }

        let similar = self
            .similarity
            .find_similar(
                &cmd.item_name,
                self.config.similarity_threshold,
                cmd.context.category.as_deref(),
            )
            .await;
        let analysis = self.extractor.analyze_item(&cmd.item_name, description);

        let system = system_prompt(&cmd.item_name, &cmd.context, self.cache.policy().defaults());
        let opening = initial_user_prompt(&cmd.item_name, description, &analysis, &similar);

        let request = CompletionRequest::new(request_metadata(&cmd.user_id, None))
            .with_message(MessageRole::System, system.clone())
            .with_message(MessageRole::User, opening.clone());

        let response = self
            .ai
            .complete(request)
            .await
            .map_err(DiscoveryError::SessionCreation)?;

        let transcript = vec![
            Message::system(system),
            Message::user(opening, None),
            Message::assistant(response.content),
        ];

        let session = DiscoverySession::start(
            cmd.user_id,
            cmd.item_name.clone(),
            cmd.item_description,
            cmd.context,
            transcript.clone(),
            u64::from(response.usage.total_tokens),
        )?;
        self.sessions
            .create(&session)
            .await
            .map_err(DiscoveryError::Persistence)?;

        self.cache
            .put_conversation(
                &cache_key,
                &CachedConversation::new(cmd.item_name, transcript),
                session.context().price_tier.as_deref(),
            )
            .await;
        self.cache.put_session(&session).await;

        tracing::info!(
            session_id = %session.id(),
            cache_key = %cache_key,
            similar = similar.len(),
            tokens = response.usage.total_tokens,
            "Discovery started"
        );
        Ok(session)
    }
}

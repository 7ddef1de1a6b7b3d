//! Streaming one operator turn.
//!
//! The provider stream is drained by a spawned task that forwards each
//! chunk over a bounded channel and accumulates the full reply. The turn
//! is persisted only when the provider signals the end of the stream;
//! cancellation or a provider error leaves the session untouched. The
//! session lock travels with the task, so later turns on the same session
//! wait until the stream has settled.

use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::{turn_request, DiscoveryService};
use crate::application::cache::CacheService;
use crate::application::errors::DiscoveryError;
use crate::application::locks::SessionGuard;
use crate::domain::discovery::{DiscoveryPhase, DiscoverySession, ExtractedData, Message};
use crate::domain::foundation::SessionId;
use crate::ports::{AIError, ChunkStream, DiscoverySessionRepository, TokenUsage};

/// One event of a streamed turn.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Incremental content, in arrival order.
    Chunk { delta: String },
    /// The turn was persisted; always the last event on success.
    Complete {
        full_content: String,
        usage: TokenUsage,
    },
    /// The turn failed and was not persisted; always the last event on failure.
    Error { message: String },
}

/// Pull-based handle on a streamed turn.
///
/// Dropping it cancels the turn.
pub struct DiscoveryStream {
    session_id: SessionId,
    phase: DiscoveryPhase,
    events: mpsc::Receiver<StreamEvent>,
    cancel: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl DiscoveryStream {
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Phase the streamed turn runs in.
    pub fn phase(&self) -> DiscoveryPhase {
        self.phase
    }

    /// Stops the turn and waits until the stream task has exited.
    ///
    /// A turn whose completion already landed stays persisted.
    pub async fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        self.events.close();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// Drains the stream, returning the terminal event.
    pub async fn finish(mut self) -> Result<(String, TokenUsage), DiscoveryError> {
        while let Some(event) = self.next().await {
            match event {
                StreamEvent::Chunk { .. } => {}
                StreamEvent::Complete {
                    full_content,
                    usage,
                } => return Ok((full_content, usage)),
                StreamEvent::Error { message } => return Err(DiscoveryError::Stream(message)),
            }
        }
        Err(DiscoveryError::Stream("stream ended without a result".into()))
    }
}

impl Stream for DiscoveryStream {
    type Item = StreamEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().events.poll_recv(cx)
    }
}

impl DiscoveryService {
    /// Streams the assistant's reply to `user_input`.
    ///
    /// No extraction runs on this path. On completion the user and
    /// assistant messages are appended together and the provider-reported
    /// usage is added to the session.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound` if the session does not exist
    /// - `SessionNotActive` if it was completed or abandoned
    /// - `AIProvider` if the provider cannot stream or refuses the stream up front
    ///
    /// Failures after the stream opened arrive as [`StreamEvent::Error`].
    pub async fn stream_response(
        &self,
        session_id: SessionId,
        user_input: impl Into<String>,
    ) -> Result<DiscoveryStream, DiscoveryError> {
        let user_input = user_input.into();
        let guard = self.locks.lock(&session_id).await;
        let session = self.load_active(&session_id).await?;

        let provider = self.ai.provider_info();
        if !provider.supports_streaming {
            return Err(DiscoveryError::AIProvider(AIError::InvalidRequest(format!(
                "{} ({}) does not support streaming",
                provider.name, provider.model
            ))));
        }

        let phase = session.phase_for_next_turn();
        let request = turn_request(&session, phase, &user_input, None);
        let chunks = self.ai.stream_complete(request).await?;

        let (tx, rx) = mpsc::channel(self.config.stream_buffer);
        let (cancel_tx, cancel_rx) = oneshot::channel();

        let turn = StreamedTurn {
            session,
            user_input,
            sessions: self.sessions.clone(),
            cache: self.cache.clone(),
            _guard: guard,
        };
        let task = tokio::spawn(turn.run(chunks, tx, cancel_rx));

        tracing::debug!(session_id = %session_id, phase = ?phase, "Streaming turn started");
        Ok(DiscoveryStream {
            session_id,
            phase,
            events: rx,
            cancel: Some(cancel_tx),
            task: Some(task),
        })
    }
}

enum Outcome {
    Finished(TokenUsage),
    Failed(AIError),
    Cancelled,
}

/// State moved into the stream task.
struct StreamedTurn {
    session: DiscoverySession,
    user_input: String,
    sessions: Arc<dyn DiscoverySessionRepository>,
    cache: CacheService,
    _guard: SessionGuard,
}

impl StreamedTurn {
    async fn run(
        mut self,
        mut chunks: ChunkStream,
        tx: mpsc::Sender<StreamEvent>,
        mut cancel: oneshot::Receiver<()>,
    ) {
        let session_id = *self.session.id();
        let mut content = String::new();

        let outcome = loop {
            tokio::select! {
                biased;
                // Fires on cancel() and when the handle is dropped.
                _ = &mut cancel => break Outcome::Cancelled,
                next = chunks.next() => match next {
                    Some(Ok(chunk)) => {
                        if !chunk.delta.is_empty() {
                            content.push_str(&chunk.delta);
                            let event = StreamEvent::Chunk { delta: chunk.delta };
                            if tx.send(event).await.is_err() {
                                break Outcome::Cancelled;
                            }
                        }
                        if let Some(reason) = chunk.finish_reason {
                            tracing::debug!(session_id = %session_id, finish_reason = ?reason, "Stream finished");
                            break Outcome::Finished(chunk.usage.unwrap_or_default());
                        }
                    }
                    Some(Err(e)) => break Outcome::Failed(e),
                    None => break Outcome::Failed(AIError::network(
                        "provider stream closed before the final chunk",
                    )),
                },
            }
        };

        let terminal = match outcome {
            Outcome::Cancelled => {
                tracing::info!(session_id = %session_id, "Streaming turn cancelled, nothing persisted");
                return;
            }
            Outcome::Failed(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "Streaming turn failed, nothing persisted");
                StreamEvent::Error {
                    message: e.to_string(),
                }
            }
            Outcome::Finished(usage) => match self.commit(&content, usage).await {
                Ok(()) => StreamEvent::Complete {
                    full_content: content,
                    usage,
                },
                Err(e) => StreamEvent::Error {
                    message: e.to_string(),
                },
            },
        };

        if tx.send(terminal).await.is_err() {
            tracing::warn!(session_id = %session_id, "Stream receiver dropped before the final event");
        }
    }

    async fn commit(&mut self, content: &str, usage: TokenUsage) -> Result<(), DiscoveryError> {
        let user = Message::user(std::mem::take(&mut self.user_input), None);
        self.session.record_turn(
            user,
            Message::assistant(content),
            ExtractedData::default(),
            u64::from(usage.total_tokens),
        )?;
        self.sessions
            .update(&self.session)
            .await
            .map_err(DiscoveryError::Persistence)?;
        self.cache.put_session(&self.session).await;

        tracing::info!(
            session_id = %self.session.id(),
            tokens = usage.total_tokens,
            "Streaming turn persisted"
        );
        Ok(())
    }
}

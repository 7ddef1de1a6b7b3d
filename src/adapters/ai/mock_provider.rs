//! Mock AI Provider for testing.
//!
//! Scripted implementation of the AIProvider port so discovery flows can run
//! without a real model.
//!
//! # Features
//!
//! - Queued responses, consumed in order
//! - Error injection, both up front and part-way through a stream
//! - Per-chunk delays for cancellation tests
//! - Call recording for verification
//!
//! # Example
//!
//! ```ignore
//! let provider = MockAIProvider::new()
//!     .with_response("Which sizes do you offer?")
//!     .with_error(AIError::unavailable("down"));
//! ```

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::ports::{
    AIError, AIProvider, ChunkStream, CompletionRequest, CompletionResponse, FinishReason,
    ProviderInfo, StreamChunk, TokenUsage,
};

/// Usage reported by `with_response`.
pub const DEFAULT_MOCK_USAGE: TokenUsage = TokenUsage {
    prompt_tokens: 10,
    completion_tokens: 20,
    total_tokens: 30,
};

/// Mock AI provider for testing.
#[derive(Debug, Clone)]
pub struct MockAIProvider {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    info: ProviderInfo,
    /// Latency before the response (or first chunk).
    delay: Duration,
    /// Latency between streamed chunks.
    chunk_delay: Duration,
    calls: Arc<Mutex<Vec<CompletionRequest>>>,
}

/// A configured mock response.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return a successful completion.
    Success { content: String, usage: TokenUsage },
    /// Fail the call outright.
    Error(AIError),
    /// Stream `content` in word chunks, then fail instead of finishing.
    /// Non-streaming calls fail immediately.
    BrokenStream { content: String, error: AIError },
    /// Stream `content` in word chunks, then end without a final chunk.
    /// Non-streaming calls return the content as a normal completion.
    TruncatedStream { content: String },
}

impl Default for MockAIProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAIProvider {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            info: ProviderInfo::new("mock", "mock-model-1").with_streaming(true),
            delay: Duration::ZERO,
            chunk_delay: Duration::ZERO,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Adds a successful response to the queue.
    pub fn with_response(self, content: impl Into<String>) -> Self {
        self.with_response_usage(content, DEFAULT_MOCK_USAGE)
    }

    /// Adds a successful response with explicit usage.
    pub fn with_response_usage(self, content: impl Into<String>, usage: TokenUsage) -> Self {
        self.push(MockResponse::Success {
            content: content.into(),
            usage,
        })
    }

    /// Adds an error response to the queue.
    pub fn with_error(self, error: AIError) -> Self {
        self.push(MockResponse::Error(error))
    }

    /// Adds a stream that emits `content` and then fails.
    pub fn with_broken_stream(self, content: impl Into<String>, error: AIError) -> Self {
        self.push(MockResponse::BrokenStream {
            content: content.into(),
            error,
        })
    }

    /// Adds a stream that emits `content` and then just stops.
    pub fn with_truncated_stream(self, content: impl Into<String>) -> Self {
        self.push(MockResponse::TruncatedStream {
            content: content.into(),
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    pub fn with_provider_info(mut self, info: ProviderInfo) -> Self {
        self.info = info;
        self
    }

    /// Queues a response on a provider that is already shared.
    pub fn enqueue(&self, response: MockResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn get_calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn push(self, response: MockResponse) -> Self {
        self.enqueue(response);
        self
    }

    fn next_response(&self) -> MockResponse {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| MockResponse::Success {
                content: "Mock response".to_string(),
                usage: TokenUsage::new(5, 10),
            })
    }

    async fn record(&self, request: CompletionRequest) {
        self.calls.lock().unwrap().push(request);
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
    }

    fn word_chunks(&self, content: &str) -> ChunkStream {
        let chunk_delay = self.chunk_delay;
        let words: Vec<String> = content.split_inclusive(' ').map(str::to_string).collect();
        Box::pin(stream::iter(words).then(move |word| async move {
            if !chunk_delay.is_zero() {
                sleep(chunk_delay).await;
            }
            Ok::<_, AIError>(StreamChunk::content(word))
        }))
    }
}

#[async_trait]
impl AIProvider for MockAIProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, AIError> {
        self.record(request).await;

        match self.next_response() {
            MockResponse::Success { content, usage } => Ok(CompletionResponse {
                content,
                usage,
                model: self.info.model.clone(),
                finish_reason: FinishReason::Stop,
            }),
            MockResponse::TruncatedStream { content } => Ok(CompletionResponse {
                content,
                usage: DEFAULT_MOCK_USAGE,
                model: self.info.model.clone(),
                finish_reason: FinishReason::Stop,
            }),
            MockResponse::Error(err) | MockResponse::BrokenStream { error: err, .. } => Err(err),
        }
    }

    async fn stream_complete(&self, request: CompletionRequest) -> Result<ChunkStream, AIError> {
        self.record(request).await;

        match self.next_response() {
            MockResponse::Success { content, usage } => {
                let last = stream::once(async move {
                    Ok::<_, AIError>(StreamChunk::final_chunk(FinishReason::Stop, usage))
                });
                Ok(Box::pin(self.word_chunks(&content).chain(last)))
            }
            MockResponse::BrokenStream { content, error } => {
                let failure = stream::once(async move { Err::<StreamChunk, _>(error) });
                Ok(Box::pin(self.word_chunks(&content).chain(failure)))
            }
            MockResponse::TruncatedStream { content } => Ok(self.word_chunks(&content)),
            MockResponse::Error(err) => Err(err),
        }
    }

    fn provider_info(&self) -> ProviderInfo {
        self.info.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::discovery::MessageRole;
    use crate::domain::foundation::UserId;
    use crate::ports::RequestMetadata;

    fn test_request() -> CompletionRequest {
        CompletionRequest::new(RequestMetadata::new(
            UserId::new("test-user").unwrap(),
            None,
            "trace-123",
        ))
        .with_message(MessageRole::User, "Hello")
    }

    async fn drain(mut stream: ChunkStream) -> (String, Option<StreamChunk>, Option<AIError>) {
        let mut content = String::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) if chunk.is_final() => return (content, Some(chunk), None),
                Ok(chunk) => content.push_str(&chunk.delta),
                Err(err) => return (content, None, Some(err)),
            }
        }
        (content, None, None)
    }

    #[tokio::test]
    async fn returns_responses_in_order_then_default() {
        let provider = MockAIProvider::new().with_response("First").with_response("Second");

        assert_eq!(provider.complete(test_request()).await.unwrap().content, "First");
        assert_eq!(provider.complete(test_request()).await.unwrap().content, "Second");
        assert_eq!(
            provider.complete(test_request()).await.unwrap().content,
            "Mock response"
        );
    }

    #[tokio::test]
    async fn reports_configured_usage_and_model() {
        let provider =
            MockAIProvider::new().with_response_usage("Hi", TokenUsage::new(7, 3));
        let response = provider.complete(test_request()).await.unwrap();
        assert_eq!(response.usage.total_tokens, 10);
        assert_eq!(response.model, "mock-model-1");
    }

    #[tokio::test]
    async fn returns_configured_error() {
        let provider = MockAIProvider::new().with_error(AIError::rate_limited(30));
        let err = provider.complete(test_request()).await.unwrap_err();
        assert_eq!(err, AIError::rate_limited(30));
    }

    #[tokio::test]
    async fn tracks_calls() {
        let provider = MockAIProvider::new();
        provider.complete(test_request()).await.unwrap();
        provider.stream_complete(test_request()).await.unwrap();
        assert_eq!(provider.call_count(), 2);
        assert_eq!(provider.get_calls()[0].last_content(), Some("Hello"));

        provider.clear_calls();
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn streaming_reassembles_exact_content() {
        let provider = MockAIProvider::new().with_response("Hello  world from streaming");
        let (content, last, err) = drain(provider.stream_complete(test_request()).await.unwrap()).await;

        assert_eq!(content, "Hello  world from streaming");
        assert_eq!(last.unwrap().usage, Some(DEFAULT_MOCK_USAGE));
        assert!(err.is_none());
    }

    #[tokio::test]
    async fn broken_stream_fails_after_content() {
        let provider =
            MockAIProvider::new().with_broken_stream("partial text", AIError::network("reset"));
        let (content, last, err) = drain(provider.stream_complete(test_request()).await.unwrap()).await;

        assert_eq!(content, "partial text");
        assert!(last.is_none());
        assert_eq!(err, Some(AIError::network("reset")));
    }

    #[tokio::test]
    async fn truncated_stream_ends_without_final_chunk() {
        let provider = MockAIProvider::new().with_truncated_stream("cut short");
        let (content, last, err) = drain(provider.stream_complete(test_request()).await.unwrap()).await;

        assert_eq!(content, "cut short");
        assert!(last.is_none());
        assert!(err.is_none());
    }

    #[tokio::test]
    async fn streaming_error_fails_before_stream() {
        let provider = MockAIProvider::new().with_error(AIError::unavailable("down"));
        assert!(matches!(
            provider.stream_complete(test_request()).await,
            Err(AIError::Unavailable { .. })
        ));
    }

    #[tokio::test]
    async fn enqueue_works_on_shared_provider() {
        let provider = Arc::new(MockAIProvider::new());
        provider.enqueue(MockResponse::Success {
            content: "queued".into(),
            usage: TokenUsage::zero(),
        });
        assert_eq!(provider.complete(test_request()).await.unwrap().content, "queued");
    }

    #[tokio::test]
    async fn respects_delay() {
        let provider = MockAIProvider::new().with_delay(Duration::from_millis(30));
        let start = std::time::Instant::now();
        provider.complete(test_request()).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}

//! AI Provider Adapters.
//!
//! - `MockAIProvider` - Scripted provider for tests and offline runs
//! - `OpenAIProvider` - OpenAI-compatible chat completions over HTTP

mod mock_provider;
mod openai_provider;

pub use mock_provider::{MockAIProvider, MockResponse, DEFAULT_MOCK_USAGE};
pub use openai_provider::{OpenAIConfig, OpenAIProvider};

//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors)
//! - `discovery` - Discovery sessions, phases, extraction, prompts, cache keys, similarity
pub mod discovery;
pub mod foundation;

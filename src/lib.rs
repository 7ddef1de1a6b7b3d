//! Menu Discovery - Conversational menu-item discovery engine
//!
//! Drives a multi-turn exchange with an LLM completion service to elicit
//! structured menu-item data (variants, modifiers, dietary metadata) from
//! free-text operator input. Repeated requests are short-circuited through a
//! conversation cache, and similar past items enrich new conversations.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

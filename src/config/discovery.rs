//! Discovery engine tuning

use serde::Deserialize;

use super::error::ValidationError;
use crate::domain::discovery::{CachePolicy, ContextDefaults};

/// Knobs of the discovery lifecycle, injected into `DiscoveryService`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DiscoveryConfig {
    /// Minimum score (0-100) for a prior extraction to enrich the first prompt
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Messages scanned by phase extraction after each turn
    #[serde(default = "default_extraction_window")]
    pub extraction_window: usize,

    /// Base TTL of cached conversations, in seconds
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// TTL multiplier for premium/high price tiers
    #[serde(default = "default_premium_multiplier")]
    pub premium_ttl_multiplier: u64,

    /// TTL multiplier for session snapshots
    #[serde(default = "default_session_multiplier")]
    pub session_ttl_multiplier: u64,

    /// Lifetime of stored extractions, in days
    #[serde(default = "default_stored_extraction_ttl_days")]
    pub stored_extraction_ttl_days: i64,

    #[serde(default = "default_cuisine")]
    pub default_cuisine: String,

    #[serde(default = "default_location")]
    pub default_location: String,

    #[serde(default = "default_price_tier")]
    pub default_price_tier: String,

    #[serde(default = "default_language")]
    pub default_language: String,

    /// Events buffered between the stream task and its consumer
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,
}

impl DiscoveryConfig {
    /// Defaults substituted for unset restaurant context fields.
    pub fn context_defaults(&self) -> ContextDefaults {
        ContextDefaults {
            cuisine_type: self.default_cuisine.clone(),
            location: self.default_location.clone(),
            price_tier: self.default_price_tier.clone(),
            language: self.default_language.clone(),
        }
    }

    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy::new(
            self.context_defaults(),
            self.cache_ttl_secs,
            self.premium_ttl_multiplier,
            self.session_ttl_multiplier,
        )
    }

    /// Validate discovery configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(0.0..=100.0).contains(&self.similarity_threshold) {
            return Err(ValidationError::InvalidSimilarityThreshold);
        }
        if self.extraction_window == 0 {
            return Err(ValidationError::InvalidExtractionWindow);
        }
        if self.cache_ttl_secs == 0
            || self.premium_ttl_multiplier == 0
            || self.session_ttl_multiplier == 0
            || self.stored_extraction_ttl_days <= 0
        {
            return Err(ValidationError::InvalidCacheTtl);
        }
        if self.stream_buffer == 0 {
            return Err(ValidationError::InvalidStreamBuffer);
        }
        Ok(())
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            extraction_window: default_extraction_window(),
            cache_ttl_secs: default_cache_ttl(),
            premium_ttl_multiplier: default_premium_multiplier(),
            session_ttl_multiplier: default_session_multiplier(),
            stored_extraction_ttl_days: default_stored_extraction_ttl_days(),
            default_cuisine: default_cuisine(),
            default_location: default_location(),
            default_price_tier: default_price_tier(),
            default_language: default_language(),
            stream_buffer: default_stream_buffer(),
        }
    }
}

fn default_similarity_threshold() -> f64 {
    80.0
}

fn default_extraction_window() -> usize {
    3
}

fn default_cache_ttl() -> u64 {
    86_400
}

fn default_premium_multiplier() -> u64 {
    2
}

fn default_session_multiplier() -> u64 {
    7
}

fn default_stored_extraction_ttl_days() -> i64 {
    30
}

fn default_cuisine() -> String {
    "general".to_string()
}

fn default_location() -> String {
    "Chile".to_string()
}

fn default_price_tier() -> String {
    "medium".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_stream_buffer() -> usize {
    32
}

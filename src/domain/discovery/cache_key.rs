//! Cache key derivation and TTL policy for discovery conversations.
//!
//! Keys are content hashes of a canonical, field-sorted JSON object, so the
//! same logical request always lands on the same key no matter how the
//! parameters were assembled.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::foundation::SessionId;

/// Namespace for cached opening conversations.
pub const CONVERSATION_KEY_PREFIX: &str = "discovery:conversation";

/// Namespace for session snapshots.
pub const SESSION_KEY_PREFIX: &str = "discovery:session";

/// Price tiers that earn the longer conversation TTL.
const LONG_LIVED_TIERS: [&str; 2] = ["premium", "high"];

/// Logical parameters that identify a discovery request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheKeyParams {
    pub item_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cuisine_type: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub price_tier: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub force_refresh: bool,
}

impl CacheKeyParams {
    pub fn new(item_name: impl Into<String>) -> Self {
        Self {
            item_name: item_name.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_cuisine_type(mut self, cuisine_type: impl Into<String>) -> Self {
        self.cuisine_type = Some(cuisine_type.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_price_tier(mut self, price_tier: impl Into<String>) -> Self {
        self.price_tier = Some(price_tier.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }

    /// Builds params from loosely-keyed pairs, in any order.
    ///
    /// Unknown keys are ignored. `force_refresh` is set by any of
    /// `true`, `1`, or `yes`.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let value = value.into();
            match key.as_ref() {
                "item_name" => params.item_name = value,
                "description" => params.description = Some(value),
                "cuisine_type" => params.cuisine_type = Some(value),
                "location" => params.location = Some(value),
                "price_tier" => params.price_tier = Some(value),
                "language" => params.language = Some(value),
                "force_refresh" => {
                    params.force_refresh =
                        matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
                }
                _ => {}
            }
        }
        params
    }
}

/// Values substituted for unset context fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextDefaults {
    pub cuisine_type: String,
    pub location: String,
    pub price_tier: String,
    pub language: String,
}

impl Default for ContextDefaults {
    fn default() -> Self {
        Self {
            cuisine_type: "general".to_string(),
            location: "Chile".to_string(),
            price_tier: "medium".to_string(),
            language: "en".to_string(),
        }
    }
}

/// Key derivation and TTL rules for the conversation cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    defaults: ContextDefaults,
    base_ttl_secs: u64,
    premium_multiplier: u64,
    session_multiplier: u64,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            defaults: ContextDefaults::default(),
            base_ttl_secs: 86_400,
            premium_multiplier: 2,
            session_multiplier: 7,
        }
    }
}

impl CachePolicy {
    pub fn new(
        defaults: ContextDefaults,
        base_ttl_secs: u64,
        premium_multiplier: u64,
        session_multiplier: u64,
    ) -> Self {
        Self {
            defaults,
            base_ttl_secs,
            premium_multiplier,
            session_multiplier,
        }
    }

    pub fn defaults(&self) -> &ContextDefaults {
        &self.defaults
    }

    /// Derives the cache key for a discovery request.
    pub fn derive_key(&self, params: &CacheKeyParams) -> String {
        let canonical: BTreeMap<&str, String> = [
            ("item_name", normalize_text(&params.item_name)),
            (
                "description",
                params.description.as_deref().map(normalize_text).unwrap_or_default(),
            ),
            (
                "cuisine_type",
                or_default(&params.cuisine_type, &self.defaults.cuisine_type),
            ),
            ("location", or_default(&params.location, &self.defaults.location)),
            ("price_tier", or_default(&params.price_tier, &self.defaults.price_tier)),
            ("language", or_default(&params.language, &self.defaults.language)),
        ]
        .into_iter()
        .collect();

        // BTreeMap serializes in key order, which makes the JSON canonical.
        let json = serde_json::to_string(&canonical).unwrap_or_default();
        format!("{}:{}", CONVERSATION_KEY_PREFIX, sha256_hex(&json))
    }

    /// TTL for a cached conversation, in seconds.
    pub fn conversation_ttl_secs(&self, price_tier: Option<&str>) -> u64 {
        let tier = price_tier
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.defaults.price_tier)
            .to_lowercase();

        if LONG_LIVED_TIERS.contains(&tier.as_str()) {
            self.base_ttl_secs * self.premium_multiplier
        } else {
            self.base_ttl_secs
        }
    }

    /// TTL for a session snapshot, in seconds.
    pub fn session_ttl_secs(&self) -> u64 {
        self.base_ttl_secs * self.session_multiplier
    }

    /// Cache-then-compute is the default; only an explicit refresh bypasses it.
    pub fn should_use_cache(&self, params: &CacheKeyParams) -> bool {
        !params.force_refresh
    }
}

/// Key under which a session snapshot is cached.
pub fn session_key(id: &SessionId) -> String {
    format!("{}:{}", SESSION_KEY_PREFIX, id)
}

/// Lowercases, collapses internal whitespace and trims.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn or_default(value: &Option<String>, default: &str) -> String {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}

pub(crate) fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

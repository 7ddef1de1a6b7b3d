//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `MENU_DISCOVERY` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use menu_discovery::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Using model {}", config.ai.model);
//! ```

mod ai;
mod database;
mod discovery;
mod error;
mod logging;
mod redis;

pub use ai::AiConfig;
pub use database::DatabaseConfig;
pub use discovery::DiscoveryConfig;
pub use error::{ConfigError, ValidationError};
pub use logging::{LogFormat, LoggingConfig};
pub use redis::RedisConfig;

use serde::Deserialize;

/// Root application configuration
///
/// Redis and PostgreSQL are optional; without them the in-memory adapters
/// are wired instead. Load using [`AppConfig::load()`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// AI provider configuration (OpenAI-compatible)
    #[serde(default)]
    pub ai: AiConfig,

    /// Redis configuration (shared cache)
    #[serde(default)]
    pub redis: Option<RedisConfig>,

    /// Database configuration (PostgreSQL)
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    /// Discovery engine tuning
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `MENU_DISCOVERY` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `MENU_DISCOVERY__AI__MODEL=gpt-4o` -> `ai.model = gpt-4o`
    /// - `MENU_DISCOVERY__DISCOVERY__SIMILARITY_THRESHOLD=75` -> `discovery.similarity_threshold = 75`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("MENU_DISCOVERY")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.ai.validate()?;
        if let Some(redis) = &self.redis {
            redis.validate()?;
        }
        if let Some(database) = &self.database {
            database.validate()?;
        }
        self.discovery.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "MENU_DISCOVERY__AI__OPENAI_API_KEY",
        "MENU_DISCOVERY__AI__MODEL",
        "MENU_DISCOVERY__REDIS__URL",
        "MENU_DISCOVERY__DATABASE__URL",
        "MENU_DISCOVERY__DISCOVERY__SIMILARITY_THRESHOLD",
        "MENU_DISCOVERY__DISCOVERY__DEFAULT_LOCATION",
        "MENU_DISCOVERY__LOGGING__FORMAT",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_load_with_no_environment_uses_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let result = AppConfig::load();

        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert!(config.redis.is_none());
        assert!(config.database.is_none());
        assert_eq!(config.discovery, DiscoveryConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("MENU_DISCOVERY__AI__OPENAI_API_KEY", "sk-test");
        env::set_var("MENU_DISCOVERY__AI__MODEL", "gpt-4o");
        env::set_var("MENU_DISCOVERY__REDIS__URL", "redis://localhost:6379");
        env::set_var("MENU_DISCOVERY__DATABASE__URL", "postgresql://test@localhost/test");
        env::set_var("MENU_DISCOVERY__DISCOVERY__SIMILARITY_THRESHOLD", "75");
        env::set_var("MENU_DISCOVERY__DISCOVERY__DEFAULT_LOCATION", "Peru");
        env::set_var("MENU_DISCOVERY__LOGGING__FORMAT", "json");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.ai.has_openai());
        assert_eq!(config.ai.model, "gpt-4o");
        assert_eq!(config.redis.unwrap().url, "redis://localhost:6379");
        assert_eq!(config.database.unwrap().url, "postgresql://test@localhost/test");
        assert_eq!(config.discovery.similarity_threshold, 75.0);
        assert_eq!(config.discovery.default_location, "Peru");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_validate_rejects_bad_optional_section() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("MENU_DISCOVERY__REDIS__URL", "http://not-redis");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.validate(), Err(ValidationError::InvalidRedisUrl));
    }
}

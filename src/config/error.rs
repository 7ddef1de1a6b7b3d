//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Invalid Redis URL format")]
    InvalidRedisUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Invalid AI base URL format")]
    InvalidAiBaseUrl,

    #[error("Temperature must be between 0 and 2")]
    InvalidTemperature,

    #[error("Max tokens must be greater than zero")]
    InvalidMaxTokens,

    #[error("Similarity threshold must be between 0 and 100")]
    InvalidSimilarityThreshold,

    #[error("Extraction window must be at least 1 message")]
    InvalidExtractionWindow,

    #[error("Cache TTL and multipliers must be greater than zero")]
    InvalidCacheTtl,

    #[error("Stream buffer must be greater than zero")]
    InvalidStreamBuffer,

    #[error("Unknown log level: {0}")]
    InvalidLogLevel(String),
}

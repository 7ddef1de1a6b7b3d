//! Errors surfaced by discovery operations.

use thiserror::Error;

use crate::domain::discovery::DiscoveryStatus;
use crate::domain::foundation::{DomainError, SessionId};
use crate::ports::AIError;

/// Failure of a discovery lifecycle operation.
#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    #[error("Discovery session not found: {0}")]
    SessionNotFound(SessionId),

    /// The completion call that opens a session failed; nothing was persisted.
    #[error("Failed to start discovery: {0}")]
    SessionCreation(#[source] AIError),

    /// The completion call of a turn failed; the session is unchanged.
    #[error(transparent)]
    AIProvider(#[from] AIError),

    #[error("Discovery session {id} is {status}")]
    SessionNotActive { id: SessionId, status: DiscoveryStatus },

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Persistence failure: {0}")]
    Persistence(#[source] DomainError),

    #[error("Stream failed: {0}")]
    Stream(String),
}

impl DiscoveryError {
    pub fn not_active(id: SessionId, status: DiscoveryStatus) -> Self {
        Self::SessionNotActive { id, status }
    }

    /// True when the caller may retry the same request unchanged.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::SessionCreation(err) | Self::AIProvider(err) => err.is_retryable(),
            Self::Persistence(_) | Self::Stream(_) => true,
            _ => false,
        }
    }
}

impl From<DomainError> for DiscoveryError {
    fn from(err: DomainError) -> Self {
        use crate::domain::foundation::ErrorCode;
        match err.code {
            ErrorCode::ValidationFailed => Self::Validation(err.message),
            _ => Self::Persistence(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ErrorCode;

    #[test]
    fn provider_errors_pass_through_unchanged() {
        let err: DiscoveryError = AIError::rate_limited(30).into();
        assert_eq!(err.to_string(), "rate limited: retry after 30s");
        assert!(err.is_transient());
    }

    #[test]
    fn creation_failure_names_the_cause() {
        let err = DiscoveryError::SessionCreation(AIError::AuthenticationFailed);
        assert_eq!(err.to_string(), "Failed to start discovery: authentication failed");
        assert!(!err.is_transient());
    }

    #[test]
    fn validation_domain_errors_become_validation() {
        let err: DiscoveryError =
            DomainError::new(ErrorCode::ValidationFailed, "Item name cannot be empty").into();
        assert!(matches!(err, DiscoveryError::Validation(msg) if msg.contains("Item name")));
    }

    #[test]
    fn other_domain_errors_become_persistence() {
        let err: DiscoveryError = DomainError::database("connection reset").into();
        assert!(matches!(err, DiscoveryError::Persistence(_)));
    }

    #[test]
    fn not_active_reports_status() {
        let id = SessionId::new();
        let err = DiscoveryError::not_active(id, DiscoveryStatus::Completed);
        assert_eq!(err.to_string(), format!("Discovery session {} is completed", id));
    }
}

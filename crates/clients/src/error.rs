//! Typed errors surfaced by the external service clients.

use thiserror::Error;

/// A failure from one of the collaborator services.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// Transport failure, timeout, or 5xx. Retryable by the caller of the
    /// orchestrator (and auto-retried inside the polling engine only).
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Business rejection (invalid OTP, product not purchasable, ...).
    /// Terminal for the current step without new user input.
    #[error("rejected: {reason}")]
    Rejected { reason: String },

    /// The service refused a specific request field.
    #[error("invalid field '{field}'")]
    Invalid { field: String },

    /// A success response was structurally invalid (missing required
    /// fields). Fatal for the attempt.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl ServiceError {
    /// Creates an `Unavailable` error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }

    /// Creates a `Rejected` error with the service's reason string.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// Returns true if the same call may be retried as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Unavailable(_))
    }

    /// Returns true if the error is fatal for the whole attempt.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ServiceError::MalformedResponse(_))
    }
}

/// Convenience type alias for client results.
pub type Result<T> = std::result::Result<T, ServiceError>;

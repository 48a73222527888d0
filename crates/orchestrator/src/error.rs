//! Orchestrator error types.

use clients::ServiceError;
use common::AttemptId;
use domain::{AttemptState, ValidationError};
use thiserror::Error;

/// Errors surfaced by orchestrator operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FlowError {
    /// A local pre-submission invariant failed; no service was called.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A collaborator service call failed. Retryable variants leave the
    /// attempt in the failing step so the same call can be repeated.
    #[error("service call failed: {0}")]
    Service(#[from] ServiceError),

    /// The operation is not valid in the attempt's current state. Always
    /// a caller-ordering bug (e.g. a double submit); the attempt is left
    /// unchanged.
    #[error("operation '{operation}' is not valid in state {state}")]
    InvalidStateTransition {
        operation: &'static str,
        state: AttemptState,
    },

    /// Another call is already in flight for this attempt. Steps are
    /// strictly serialized per handle; the call was rejected, not queued.
    #[error("operation '{operation}' rejected: another call is in flight for this attempt")]
    ConcurrentCall { operation: &'static str },

    /// Status polling was cancelled by the caller. The attempt stays in
    /// `PollingStatus` and polling can be resumed.
    #[error("payment-status polling was cancelled")]
    Cancelled,

    /// No attempt is registered under the given handle.
    #[error("unknown attempt: {0}")]
    UnknownAttempt(AttemptId),

    /// Non-retryable failure; the attempt has moved to `Failed` and a new
    /// attempt must be started.
    #[error("attempt failed: {0}")]
    Fatal(String),
}

/// Convenience type alias for orchestrator results.
pub type Result<T> = std::result::Result<T, FlowError>;

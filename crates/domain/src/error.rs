//! Domain error types.

use thiserror::Error;

/// A field-level validation failure raised before any service call.
///
/// Violations of the fulfillment thresholds (and other local invariants)
/// are reported as values of this type and never reach the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation failed for '{field}': {reason}")]
pub struct ValidationError {
    /// The request field that failed validation.
    pub field: &'static str,
    /// Human-readable reason for the failure.
    pub reason: String,
}

impl ValidationError {
    /// Creates a new validation error for the given field.
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

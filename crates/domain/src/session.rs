//! Explicit session context passed through the flow.

use common::UserId;
use serde::{Deserialize, Serialize};

use crate::request::TaxId;

/// Identity context for the purchase, supplied by the identity/session
/// provider collaborator.
///
/// Passed explicitly into `begin()` and carried on the attempt for every
/// downstream call, rather than read from any global store; its lifecycle
/// (load, clear) belongs to the provider, not the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    user_id: UserId,
    tax_id: TaxId,
}

impl SessionContext {
    /// Creates a session context for the given user.
    pub fn new(user_id: UserId, tax_id: TaxId) -> Self {
        Self { user_id, tax_id }
    }

    /// Returns the authenticated user's id.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the user's tax identifier.
    pub fn tax_id(&self) -> &TaxId {
        &self.tax_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let user_id = UserId::new();
        let session = SessionContext::new(user_id, TaxId::new("ABCDE1234F"));
        assert_eq!(session.user_id(), user_id);
        assert_eq!(session.tax_id().as_str(), "ABCDE1234F");
    }
}

//! Folio-form service trait and in-memory implementation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::AttemptId;
use domain::{FolioResolution, NewFolioTemplate};

use crate::error::ServiceError;

/// Trait for the folio-form service, which opens fresh folios.
#[async_trait]
pub trait FolioFormService: Send + Sync {
    /// Resolves a new folio through the offered template.
    async fn resolve_new_folio(
        &self,
        attempt_id: AttemptId,
        template: &NewFolioTemplate,
    ) -> Result<FolioResolution, ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryFolioFormState {
    fail_on_resolve: Option<ServiceError>,
    resolve_calls: u32,
    seen_attempt_ids: Vec<AttemptId>,
    next_id: u32,
}

/// In-memory folio-form service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFolioFormService {
    state: Arc<RwLock<InMemoryFolioFormState>>,
}

impl InMemoryFolioFormService {
    /// Creates a new in-memory folio-form service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures resolution to fail with the given error.
    pub fn set_fail_on_resolve(&self, error: Option<ServiceError>) {
        self.state.write().unwrap().fail_on_resolve = error;
    }

    /// Returns how many resolutions were requested.
    pub fn resolve_calls(&self) -> u32 {
        self.state.read().unwrap().resolve_calls
    }

    /// Returns every attempt id seen, in arrival order.
    pub fn seen_attempt_ids(&self) -> Vec<AttemptId> {
        self.state.read().unwrap().seen_attempt_ids.clone()
    }
}

#[async_trait]
impl FolioFormService for InMemoryFolioFormService {
    async fn resolve_new_folio(
        &self,
        attempt_id: AttemptId,
        template: &NewFolioTemplate,
    ) -> Result<FolioResolution, ServiceError> {
        let mut state = self.state.write().unwrap();
        state.resolve_calls += 1;
        state.seen_attempt_ids.push(attempt_id);
        if let Some(error) = state.fail_on_resolve.clone() {
            return Err(error);
        }
        state.next_id += 1;
        Ok(FolioResolution {
            submission_id: format!("SUB-{:04}", state.next_id),
            external_transaction_id: format!("EXT-{}-{:04}", template.form_id, state.next_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> NewFolioTemplate {
        NewFolioTemplate {
            form_url: "https://folio.example/forms/1".to_string(),
            form_id: "form-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_resolve_assigns_sequential_submissions() {
        let service = InMemoryFolioFormService::new();
        let r1 = service
            .resolve_new_folio(AttemptId::new(), &template())
            .await
            .unwrap();
        let r2 = service
            .resolve_new_folio(AttemptId::new(), &template())
            .await
            .unwrap();
        assert_eq!(r1.submission_id, "SUB-0001");
        assert_eq!(r2.submission_id, "SUB-0002");
        assert_eq!(service.resolve_calls(), 2);
    }

    #[tokio::test]
    async fn test_fail_on_resolve() {
        let service = InMemoryFolioFormService::new();
        service.set_fail_on_resolve(Some(ServiceError::rejected("form expired")));

        let result = service.resolve_new_folio(AttemptId::new(), &template()).await;
        assert_eq!(result, Err(ServiceError::rejected("form expired")));
    }
}

//! Transaction service trait and in-memory implementation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::AttemptId;
use domain::{
    ExistingFolio, FolioOption, InvestmentRequest, NewFolioTemplate, PaymentMethod, SessionContext,
};

use crate::error::ServiceError;

/// Folio data returned by a successful selection submission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmitResponse {
    /// Existing folios the purchase may go into (possibly empty).
    pub existing_folios: Vec<ExistingFolio>,
    /// Template for opening a fresh folio, when offered.
    pub new_folio_template: Option<NewFolioTemplate>,
}

impl SubmitResponse {
    /// Flattens the response into the selectable option list.
    pub fn into_options(self) -> Vec<FolioOption> {
        let mut options: Vec<FolioOption> = self
            .existing_folios
            .into_iter()
            .map(FolioOption::Existing)
            .collect();
        if let Some(template) = self.new_folio_template {
            options.push(FolioOption::New(template));
        }
        options
    }
}

/// Trait for the transaction service.
#[async_trait]
pub trait TransactionService: Send + Sync {
    /// Submits the purchase selection, keyed by the attempt id.
    async fn submit_selection(
        &self,
        attempt_id: AttemptId,
        session: &SessionContext,
        request: &InvestmentRequest,
    ) -> Result<SubmitResponse, ServiceError>;

    /// Lists the payment methods offered for the attempt.
    ///
    /// `submission_id` carries the folio-form submission for a new-folio
    /// purchase; for an existing folio the service keys off the attempt id
    /// alone. Methods with no authentication mode are filtered out here at
    /// the boundary and never surface.
    async fn list_payment_methods(
        &self,
        attempt_id: AttemptId,
        submission_id: Option<&str>,
    ) -> Result<Vec<PaymentMethod>, ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryTransactionState {
    submit_response: SubmitResponse,
    payment_methods: Vec<PaymentMethod>,
    fail_on_submit: Option<ServiceError>,
    fail_on_list: Option<ServiceError>,
    submit_calls: u32,
    list_calls: u32,
    seen_attempt_ids: Vec<AttemptId>,
}

/// In-memory transaction service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTransactionService {
    state: Arc<RwLock<InMemoryTransactionState>>,
}

impl InMemoryTransactionService {
    /// Creates a new in-memory transaction service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the folio data returned by the next submissions.
    pub fn set_submit_response(&self, response: SubmitResponse) {
        self.state.write().unwrap().submit_response = response;
    }

    /// Scripts the payment methods returned by listing.
    pub fn set_payment_methods(&self, methods: Vec<PaymentMethod>) {
        self.state.write().unwrap().payment_methods = methods;
    }

    /// Configures submission to fail with the given error (once cleared
    /// with `None`, submissions succeed again).
    pub fn set_fail_on_submit(&self, error: Option<ServiceError>) {
        self.state.write().unwrap().fail_on_submit = error;
    }

    /// Configures method listing to fail with the given error.
    pub fn set_fail_on_list(&self, error: Option<ServiceError>) {
        self.state.write().unwrap().fail_on_list = error;
    }

    /// Returns how many submissions were received.
    pub fn submit_calls(&self) -> u32 {
        self.state.read().unwrap().submit_calls
    }

    /// Returns how many listing calls were received.
    pub fn list_calls(&self) -> u32 {
        self.state.read().unwrap().list_calls
    }

    /// Returns every attempt id seen on any call, in arrival order.
    pub fn seen_attempt_ids(&self) -> Vec<AttemptId> {
        self.state.read().unwrap().seen_attempt_ids.clone()
    }
}

#[async_trait]
impl TransactionService for InMemoryTransactionService {
    async fn submit_selection(
        &self,
        attempt_id: AttemptId,
        _session: &SessionContext,
        _request: &InvestmentRequest,
    ) -> Result<SubmitResponse, ServiceError> {
        let mut state = self.state.write().unwrap();
        state.submit_calls += 1;
        state.seen_attempt_ids.push(attempt_id);
        if let Some(error) = state.fail_on_submit.clone() {
            return Err(error);
        }
        Ok(state.submit_response.clone())
    }

    async fn list_payment_methods(
        &self,
        attempt_id: AttemptId,
        _submission_id: Option<&str>,
    ) -> Result<Vec<PaymentMethod>, ServiceError> {
        let mut state = self.state.write().unwrap();
        state.list_calls += 1;
        state.seen_attempt_ids.push(attempt_id);
        if let Some(error) = state.fail_on_list.clone() {
            return Err(error);
        }
        Ok(state.payment_methods.clone())
    }
}

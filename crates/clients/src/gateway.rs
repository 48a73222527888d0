//! Payment gateway trait and in-memory implementation.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use common::AttemptId;
use domain::{FolioReference, PaymentInitiation, PaymentMethod, PaymentStatus};

use crate::error::ServiceError;

/// Trait for the payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Initiates a payment for the attempt. Safe to repeat with the same
    /// attempt id; the gateway honors it as an idempotency key.
    async fn initiate(
        &self,
        attempt_id: AttemptId,
        method: &PaymentMethod,
        folio: &FolioReference,
    ) -> Result<PaymentInitiation, ServiceError>;

    /// Fetches the current status of a previously initiated payment.
    async fn fetch_status(
        &self,
        gateway_transaction_id: &str,
    ) -> Result<PaymentStatus, ServiceError>;
}

type ProbeHook = Box<dyn Fn(u32) + Send + Sync>;

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    fail_on_initiate: Option<ServiceError>,
    scripted_statuses: VecDeque<Result<PaymentStatus, ServiceError>>,
    initiate_calls: u32,
    status_calls: u32,
    seen_attempt_ids: Vec<AttemptId>,
    next_id: u32,
}

/// In-memory payment gateway for testing.
///
/// Status polls consume a scripted sequence; once the script is drained,
/// further polls report `PENDING`.
#[derive(Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryGatewayState>>,
    probe_hook: Arc<Mutex<Option<ProbeHook>>>,
}

impl InMemoryPaymentGateway {
    /// Creates a new in-memory payment gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures initiation to fail with the given error.
    pub fn set_fail_on_initiate(&self, error: Option<ServiceError>) {
        self.state.write().unwrap().fail_on_initiate = error;
    }

    /// Scripts the results returned by successive status polls.
    pub fn script_statuses(
        &self,
        statuses: impl IntoIterator<Item = Result<PaymentStatus, ServiceError>>,
    ) {
        let mut state = self.state.write().unwrap();
        state.scripted_statuses = statuses.into_iter().collect();
    }

    /// Installs a hook invoked on every status poll with the poll count so
    /// far, before the scripted result is returned. Used by tests to act
    /// at a deterministic point mid-poll (e.g. cancel).
    pub fn set_probe_hook(&self, hook: impl Fn(u32) + Send + Sync + 'static) {
        *self.probe_hook.lock().unwrap() = Some(Box::new(hook));
    }

    /// Returns how many initiations were requested.
    pub fn initiate_calls(&self) -> u32 {
        self.state.read().unwrap().initiate_calls
    }

    /// Returns how many status polls were received.
    pub fn status_calls(&self) -> u32 {
        self.state.read().unwrap().status_calls
    }

    /// Returns every attempt id seen on initiation, in arrival order.
    pub fn seen_attempt_ids(&self) -> Vec<AttemptId> {
        self.state.read().unwrap().seen_attempt_ids.clone()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn initiate(
        &self,
        attempt_id: AttemptId,
        _method: &PaymentMethod,
        _folio: &FolioReference,
    ) -> Result<PaymentInitiation, ServiceError> {
        let mut state = self.state.write().unwrap();
        state.initiate_calls += 1;
        state.seen_attempt_ids.push(attempt_id);
        if let Some(error) = state.fail_on_initiate.clone() {
            return Err(error);
        }
        state.next_id += 1;
        let n = state.next_id;
        Ok(PaymentInitiation {
            gateway_transaction_id: format!("TX-{n:04}"),
            payment_url: format!("https://pay.example/TX-{n:04}"),
            order_id: format!("ORD-{n:04}"),
            initial_status: PaymentStatus::Pending,
        })
    }

    async fn fetch_status(
        &self,
        _gateway_transaction_id: &str,
    ) -> Result<PaymentStatus, ServiceError> {
        let count = {
            let mut state = self.state.write().unwrap();
            state.status_calls += 1;
            state.status_calls
        };
        if let Some(hook) = self.probe_hook.lock().unwrap().as_ref() {
            hook(count);
        }
        let mut state = self.state.write().unwrap();
        state
            .scripted_statuses
            .pop_front()
            .unwrap_or(Ok(PaymentStatus::Pending))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::FolioNumber;

    fn method() -> PaymentMethod {
        PaymentMethod {
            id: "pm-1".to_string(),
            mode: "NETBANKING".to_string(),
            auth_mode: "OTP".to_string(),
            mandate_limit: None,
            collected_by: "GATEWAY".to_string(),
            method_type: "ONE_SHOT".to_string(),
        }
    }

    fn folio() -> FolioReference {
        FolioReference::Existing(FolioNumber::new("123/45"))
    }

    #[tokio::test]
    async fn test_initiate_assigns_transaction_ids() {
        let gateway = InMemoryPaymentGateway::new();
        let attempt_id = AttemptId::new();

        let initiation = gateway.initiate(attempt_id, &method(), &folio()).await.unwrap();
        assert_eq!(initiation.gateway_transaction_id, "TX-0001");
        assert_eq!(initiation.initial_status, PaymentStatus::Pending);
        assert_eq!(gateway.seen_attempt_ids(), vec![attempt_id]);
    }

    #[tokio::test]
    async fn test_scripted_statuses_consumed_in_order() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.script_statuses([
            Ok(PaymentStatus::Pending),
            Err(ServiceError::unavailable("blip")),
            Ok(PaymentStatus::Paid),
        ]);

        assert_eq!(gateway.fetch_status("TX-0001").await, Ok(PaymentStatus::Pending));
        assert_eq!(
            gateway.fetch_status("TX-0001").await,
            Err(ServiceError::unavailable("blip"))
        );
        assert_eq!(gateway.fetch_status("TX-0001").await, Ok(PaymentStatus::Paid));
        // Script drained: further polls stay pending.
        assert_eq!(gateway.fetch_status("TX-0001").await, Ok(PaymentStatus::Pending));
        assert_eq!(gateway.status_calls(), 4);
    }

    #[tokio::test]
    async fn test_probe_hook_sees_poll_count() {
        let gateway = InMemoryPaymentGateway::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        gateway.set_probe_hook(move |n| sink.lock().unwrap().push(n));

        gateway.fetch_status("TX-0001").await.unwrap();
        gateway.fetch_status("TX-0001").await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }
}

//! End-to-end purchase flow tests against the in-memory services.

use std::sync::Arc;

use clients::{
    InMemoryFolioFormService, InMemoryOtpService, InMemoryPaymentGateway,
    InMemoryTransactionService, ServiceError, SubmitResponse,
};
use common::UserId;
use domain::{
    Amount, AttemptState, ExistingFolio, FolioChoice, FolioNumber, Frequency,
    FulfillmentThresholds, InvestmentKind, InvestmentRequest, NewFolioTemplate, PaymentMethod,
    PaymentStatus, SessionContext, SipSchedule, TaxId,
};
use orchestrator::{AttemptHandle, FlowError, Outcome, TransactionOrchestrator};

type TestOrchestrator = TransactionOrchestrator<
    InMemoryTransactionService,
    InMemoryFolioFormService,
    InMemoryOtpService,
    InMemoryPaymentGateway,
>;

struct Harness {
    orchestrator: Arc<TestOrchestrator>,
    transactions: InMemoryTransactionService,
    folio_forms: InMemoryFolioFormService,
    otp: InMemoryOtpService,
    gateway: InMemoryPaymentGateway,
}

impl Harness {
    fn new() -> Self {
        let transactions = InMemoryTransactionService::new();
        let folio_forms = InMemoryFolioFormService::new();
        let otp = InMemoryOtpService::new();
        let gateway = InMemoryPaymentGateway::new();

        let orchestrator = Arc::new(TransactionOrchestrator::new(
            transactions.clone(),
            folio_forms.clone(),
            otp.clone(),
            gateway.clone(),
        ));
        Self {
            orchestrator,
            transactions,
            folio_forms,
            otp,
            gateway,
        }
    }

    fn session() -> SessionContext {
        SessionContext::new(UserId::new(), TaxId::new("ABCDE1234F"))
    }

    fn thresholds() -> FulfillmentThresholds {
        FulfillmentThresholds {
            min_amount: Amount::new(500),
            max_amount: Amount::new(1_000_000),
            amount_multiple: None,
            min_installments: 6,
            max_installments: 60,
            cumulative_min_amount: Amount::new(3_000),
            allowed_recurrence_days: None,
        }
    }

    fn lumpsum_request() -> InvestmentRequest {
        InvestmentRequest {
            kind: InvestmentKind::Lumpsum,
            amount: Amount::new(5_000),
            fulfillment_id: "F1".into(),
            customer_tax_id: TaxId::new("ABCDE1234F"),
            provider_id: "fh-1".into(),
            item_id: "scheme-1".into(),
        }
    }

    fn sip_request() -> InvestmentRequest {
        InvestmentRequest {
            kind: InvestmentKind::Sip(SipSchedule {
                installment_count: 12,
                recurrence_day: 5,
                frequency: Frequency::Monthly,
            }),
            amount: Amount::new(1_000),
            fulfillment_id: "F2".into(),
            customer_tax_id: TaxId::new("ABCDE1234F"),
            provider_id: "fh-1".into(),
            item_id: "scheme-2".into(),
        }
    }

    fn existing_folio(number: &str) -> ExistingFolio {
        ExistingFolio {
            folio_number: FolioNumber::new(number),
            holder_name: "A Holder".to_string(),
            masked_email: "a***@example.com".to_string(),
            masked_mobile: "99*****210".to_string(),
        }
    }

    fn new_folio_template() -> NewFolioTemplate {
        NewFolioTemplate {
            form_url: "https://folio.example/forms/1".to_string(),
            form_id: "form-1".to_string(),
        }
    }

    fn method(id: &str) -> PaymentMethod {
        PaymentMethod {
            id: id.to_string(),
            mode: "NETBANKING".to_string(),
            auth_mode: "OTP".to_string(),
            mandate_limit: None,
            collected_by: "GATEWAY".to_string(),
            method_type: "ONE_SHOT".to_string(),
        }
    }

    /// Drives a lump-sum purchase with one existing folio and a new-folio
    /// template up to the folio choice.
    async fn begun_with_folio_choice(&self) -> AttemptHandle {
        self.transactions.set_submit_response(SubmitResponse {
            existing_folios: vec![Self::existing_folio("123/45")],
            new_folio_template: Some(Self::new_folio_template()),
        });
        self.transactions
            .set_payment_methods(vec![Self::method("pm-1"), Self::method("pm-2")]);
        self.orchestrator
            .begin(Self::session(), Self::lumpsum_request(), &Self::thresholds())
            .await
            .unwrap()
    }

    /// Drives an existing-folio purchase up to `OtpPending`.
    async fn at_otp_pending(&self) -> AttemptHandle {
        let handle = self.begun_with_folio_choice().await;
        self.orchestrator
            .select_folio(handle, FolioChoice::Existing(FolioNumber::new("123/45")))
            .await
            .unwrap();
        self.orchestrator
            .select_payment_method(handle, "pm-1")
            .await
            .unwrap();
        handle
    }

    /// Drives an existing-folio purchase up to `PaymentInitiated`.
    async fn at_payment_initiated(&self) -> AttemptHandle {
        let handle = self.at_otp_pending().await;
        self.orchestrator.submit_otp(handle, "123456").await.unwrap();
        handle
    }

    fn state(&self, handle: AttemptHandle) -> AttemptState {
        self.orchestrator.attempt(handle).unwrap().state()
    }
}

// Full-flow scenarios.

#[tokio::test(start_paused = true)]
async fn test_lumpsum_into_existing_folio_completes() {
    let h = Harness::new();
    let handle = h.begun_with_folio_choice().await;
    assert_eq!(h.state(handle), AttemptState::FolioSelectionRequired);

    h.orchestrator
        .select_folio(handle, FolioChoice::Existing(FolioNumber::new("123/45")))
        .await
        .unwrap();
    assert_eq!(h.state(handle), AttemptState::PaymentMethodPending);
    // An existing folio never touches the folio-form service.
    assert_eq!(h.folio_forms.resolve_calls(), 0);

    h.orchestrator
        .select_payment_method(handle, "pm-1")
        .await
        .unwrap();
    assert_eq!(h.state(handle), AttemptState::OtpPending);
    assert_eq!(h.otp.send_calls(), 1);

    h.orchestrator.submit_otp(handle, "123456").await.unwrap();
    assert_eq!(h.state(handle), AttemptState::PaymentInitiated);

    h.gateway.script_statuses([
        Ok(PaymentStatus::Pending),
        Ok(PaymentStatus::Pending),
        Ok(PaymentStatus::Paid),
    ]);
    let started = tokio::time::Instant::now();
    let outcome = h.orchestrator.open_payment_and_await(handle).await.unwrap();

    match outcome {
        Outcome::Completed(details) => {
            assert_eq!(details.gateway_transaction_id, "TX-0001");
            assert_eq!(details.poll_attempts, 3);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(h.state(handle), AttemptState::Completed);
    // Two 5-second waits between the three polls.
    assert_eq!(started.elapsed(), std::time::Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_sip_into_new_folio_auto_advances_and_completes() {
    let h = Harness::new();
    h.transactions.set_submit_response(SubmitResponse {
        existing_folios: Vec::new(),
        new_folio_template: Some(Harness::new_folio_template()),
    });
    h.transactions.set_payment_methods(vec![Harness::method("pm-1")]);

    let handle = h
        .orchestrator
        .begin(Harness::session(), Harness::sip_request(), &Harness::thresholds())
        .await
        .unwrap();

    // No existing folios and exactly one template: the choice is made
    // automatically and the form is resolved before methods are listed.
    let attempt = h.orchestrator.attempt(handle).unwrap();
    assert_eq!(attempt.state(), AttemptState::PaymentMethodPending);
    assert_eq!(attempt.selected_folio(), Some(&FolioChoice::New));
    assert_eq!(
        attempt.folio_resolution().map(|r| r.submission_id.as_str()),
        Some("SUB-0001")
    );
    assert_eq!(h.folio_forms.resolve_calls(), 1);

    h.orchestrator
        .select_payment_method(handle, "pm-1")
        .await
        .unwrap();
    h.orchestrator.submit_otp(handle, "123456").await.unwrap();

    h.gateway.script_statuses([Ok(PaymentStatus::Paid)]);
    let outcome = h.orchestrator.open_payment_and_await(handle).await.unwrap();
    assert!(matches!(outcome, Outcome::Completed(_)));
    assert_eq!(h.state(handle), AttemptState::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_polling_exhaustion_times_out() {
    let h = Harness::new();
    let handle = h.at_payment_initiated().await;

    // The drained script reports PENDING forever.
    let started = tokio::time::Instant::now();
    let outcome = h.orchestrator.open_payment_and_await(handle).await.unwrap();

    assert_eq!(outcome, Outcome::TimedOut { poll_attempts: 30 });
    assert_eq!(h.state(handle), AttemptState::TimedOut);
    assert_eq!(h.gateway.status_calls(), 30);
    // 29 waits between 30 polls, no trailing wait.
    assert_eq!(started.elapsed(), std::time::Duration::from_secs(145));
}

#[tokio::test(start_paused = true)]
async fn test_not_paid_is_terminal() {
    let h = Harness::new();
    let handle = h.at_payment_initiated().await;

    h.gateway
        .script_statuses([Ok(PaymentStatus::Pending), Ok(PaymentStatus::NotPaid)]);
    let outcome = h.orchestrator.open_payment_and_await(handle).await.unwrap();
    assert_eq!(outcome, Outcome::NotPaid);
    assert_eq!(h.state(handle), AttemptState::NotPaid);

    // Terminal: no step, including another wait, is accepted.
    let result = h.orchestrator.open_payment_and_await(handle).await;
    assert!(matches!(
        result,
        Err(FlowError::InvalidStateTransition { .. })
    ));
    assert_eq!(h.state(handle), AttemptState::NotPaid);
}

// Idempotency key.

#[tokio::test(start_paused = true)]
async fn test_attempt_id_flows_to_every_service_call() {
    let h = Harness::new();
    h.transactions.set_submit_response(SubmitResponse {
        existing_folios: Vec::new(),
        new_folio_template: Some(Harness::new_folio_template()),
    });
    h.transactions.set_payment_methods(vec![Harness::method("pm-1")]);

    let handle = h
        .orchestrator
        .begin(Harness::session(), Harness::lumpsum_request(), &Harness::thresholds())
        .await
        .unwrap();
    h.orchestrator
        .select_payment_method(handle, "pm-1")
        .await
        .unwrap();
    h.orchestrator.submit_otp(handle, "123456").await.unwrap();
    h.gateway.script_statuses([Ok(PaymentStatus::Paid)]);
    h.orchestrator.open_payment_and_await(handle).await.unwrap();

    // Submit + method listing, form resolution, and payment initiation all
    // carried the one attempt id.
    assert_eq!(h.transactions.seen_attempt_ids(), vec![handle.id(); 2]);
    assert_eq!(h.folio_forms.seen_attempt_ids(), vec![handle.id()]);
    assert_eq!(h.gateway.seen_attempt_ids(), vec![handle.id()]);
}

// Step ordering and serialization.

#[tokio::test(start_paused = true)]
async fn test_out_of_order_steps_are_rejected_without_mutation() {
    let h = Harness::new();
    let handle = h.begun_with_folio_choice().await;

    let before = h.orchestrator.attempt(handle).unwrap();
    for result in [
        h.orchestrator.submit(handle).await.err(),
        h.orchestrator.submit_otp(handle, "123456").await.err(),
        h.orchestrator.resend_otp(handle).await.err(),
        h.orchestrator.select_payment_method(handle, "pm-1").await.err(),
        h.orchestrator.open_payment_and_await(handle).await.err(),
    ] {
        assert!(matches!(
            result,
            Some(FlowError::InvalidStateTransition { .. })
        ));
    }
    assert_eq!(h.orchestrator.attempt(handle).unwrap(), before);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_call_on_same_attempt_is_rejected() {
    let h = Harness::new();
    let handle = h.at_payment_initiated().await;
    h.gateway
        .script_statuses([Ok(PaymentStatus::Pending), Ok(PaymentStatus::Paid)]);

    // The first wait claims the attempt on its first poll; the second call
    // is rejected immediately rather than queued behind it.
    let (first, second) = tokio::join!(
        h.orchestrator.open_payment_and_await(handle),
        h.orchestrator.open_payment_and_await(handle),
    );
    assert!(matches!(first, Ok(Outcome::Completed(_))));
    assert!(matches!(
        second,
        Err(FlowError::ConcurrentCall {
            operation: "open_payment_and_await"
        })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_reads_are_allowed_mid_poll() {
    let h = Harness::new();
    let handle = h.at_payment_initiated().await;

    let reader = h.orchestrator.clone();
    let observed = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = observed.clone();
    h.gateway.set_probe_hook(move |_| {
        sink.lock()
            .unwrap()
            .push(reader.attempt(handle).unwrap().state());
    });

    h.gateway
        .script_statuses([Ok(PaymentStatus::Pending), Ok(PaymentStatus::Paid)]);
    h.orchestrator.open_payment_and_await(handle).await.unwrap();

    assert_eq!(
        *observed.lock().unwrap(),
        vec![AttemptState::PollingStatus; 2]
    );
}

// Failure recovery.

#[tokio::test(start_paused = true)]
async fn test_wrong_otp_codes_never_exhaust_the_attempt() {
    let h = Harness::new();
    let handle = h.at_otp_pending().await;

    for _ in 0..5 {
        let result = h.orchestrator.submit_otp(handle, "999999").await;
        assert!(matches!(
            result,
            Err(FlowError::Service(ServiceError::Rejected { .. }))
        ));
        assert_eq!(h.state(handle), AttemptState::OtpPending);
    }
    let attempt = h.orchestrator.attempt(handle).unwrap();
    assert!(attempt.last_error().is_some());

    // A resend supersedes the challenge and the right code still lands.
    h.orchestrator.resend_otp(handle).await.unwrap();
    assert_eq!(h.otp.resend_calls(), 1);
    h.orchestrator.submit_otp(handle, "123456").await.unwrap();
    assert_eq!(h.state(handle), AttemptState::PaymentInitiated);
    assert!(h.orchestrator.attempt(handle).unwrap().last_error().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_transient_status_failures_are_polled_through() {
    let h = Harness::new();
    let handle = h.at_payment_initiated().await;

    h.gateway.script_statuses([
        Err(ServiceError::unavailable("502 from gateway")),
        Ok(PaymentStatus::Pending),
        Err(ServiceError::unavailable("timeout")),
        Ok(PaymentStatus::Paid),
    ]);
    let outcome = h.orchestrator.open_payment_and_await(handle).await.unwrap();

    match outcome {
        Outcome::Completed(details) => assert_eq!(details.poll_attempts, 4),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_method_listing_failure_rolls_back_to_folio_choice() {
    let h = Harness::new();
    let handle = h.begun_with_folio_choice().await;
    h.transactions
        .set_fail_on_list(Some(ServiceError::unavailable("503")));

    let result = h
        .orchestrator
        .select_folio(handle, FolioChoice::Existing(FolioNumber::new("123/45")))
        .await;
    assert!(matches!(result, Err(FlowError::Service(_))));
    assert_eq!(h.state(handle), AttemptState::FolioSelectionRequired);

    // Choosing again retries the listing under the same attempt id.
    h.transactions.set_fail_on_list(None);
    h.orchestrator
        .select_folio(handle, FolioChoice::Existing(FolioNumber::new("123/45")))
        .await
        .unwrap();
    assert_eq!(h.state(handle), AttemptState::PaymentMethodPending);
    let ids = h.transactions.seen_attempt_ids();
    assert!(ids.iter().all(|id| *id == handle.id()));
    assert_eq!(ids.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_otp_send_failure_keeps_method_selectable() {
    let h = Harness::new();
    let handle = h.begun_with_folio_choice().await;
    h.orchestrator
        .select_folio(handle, FolioChoice::Existing(FolioNumber::new("123/45")))
        .await
        .unwrap();

    h.otp.set_fail_on_send(Some(ServiceError::unavailable("503")));
    let result = h.orchestrator.select_payment_method(handle, "pm-1").await;
    assert!(matches!(result, Err(FlowError::Service(_))));

    // The selection was not recorded; the step repeats cleanly.
    let attempt = h.orchestrator.attempt(handle).unwrap();
    assert_eq!(attempt.state(), AttemptState::PaymentMethodPending);
    assert!(attempt.selected_payment_method().is_none());

    h.otp.set_fail_on_send(None);
    h.orchestrator
        .select_payment_method(handle, "pm-2")
        .await
        .unwrap();
    assert_eq!(h.state(handle), AttemptState::OtpPending);
}

// Cancellation.

#[tokio::test(start_paused = true)]
async fn test_cancellation_mid_poll_leaves_attempt_resumable() {
    let h = Harness::new();
    let handle = h.at_payment_initiated().await;

    // Cancel from inside the second status poll.
    let canceller = h.orchestrator.clone();
    h.gateway.set_probe_hook(move |n| {
        if n == 2 {
            canceller.cancel_polling(handle).unwrap();
        }
    });

    let result = h.orchestrator.open_payment_and_await(handle).await;
    assert!(matches!(result, Err(FlowError::Cancelled)));
    assert_eq!(h.state(handle), AttemptState::PollingStatus);
    assert_eq!(h.gateway.status_calls(), 2);

    // Resuming keeps the original initiation and confirms normally.
    h.gateway.script_statuses([Ok(PaymentStatus::Paid)]);
    let outcome = h.orchestrator.open_payment_and_await(handle).await.unwrap();
    assert!(matches!(outcome, Outcome::Completed(_)));
    assert_eq!(h.gateway.initiate_calls(), 1);
    assert_eq!(h.state(handle), AttemptState::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_polling_is_a_noop_for_the_next_run() {
    let h = Harness::new();
    let handle = h.at_payment_initiated().await;

    // A stale cancel must not poison the run that starts afterwards.
    h.orchestrator.cancel_polling(handle).unwrap();
    h.gateway.script_statuses([Ok(PaymentStatus::Paid)]);
    let outcome = h.orchestrator.open_payment_and_await(handle).await.unwrap();
    assert!(matches!(outcome, Outcome::Completed(_)));
}

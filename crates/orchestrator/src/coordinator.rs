//! Transaction orchestrator driving purchase attempts step by step.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use clients::{
    FolioFormService, OtpService, PaymentGateway, ServiceError, TransactionService,
};
use common::AttemptId;
use domain::{
    AttemptState, FolioChoice, FolioOption, FulfillmentThresholds, InvestmentRequest,
    NewFolioTemplate, PaymentStatus, SessionContext, TransactionAttempt, ValidationError,
};
use tokio_util::sync::CancellationToken;

use crate::error::FlowError;
use crate::outcome::{CompletionDetails, Outcome};
use crate::poller::{self, PollConfig, PollResult, Probe};

/// Opaque handle to a registered purchase attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttemptHandle {
    id: AttemptId,
}

impl AttemptHandle {
    /// Returns the attempt id behind the handle.
    pub fn id(&self) -> AttemptId {
        self.id
    }
}

/// Per-attempt bookkeeping.
///
/// The attempt itself sits behind a read-write lock that is only ever
/// held briefly and never across an await; step serialization is done by
/// the separate `busy` mutex, which mutating operations `try_lock` so a
/// concurrent call on the same handle is rejected rather than queued.
/// Readers snapshot the attempt at any time without touching `busy`.
struct AttemptSlot {
    attempt: RwLock<TransactionAttempt>,
    busy: tokio::sync::Mutex<()>,
    poll_cancel: Mutex<CancellationToken>,
}

/// Orchestrates the execution of purchase attempts.
///
/// Owns one [`TransactionAttempt`] per begun purchase and is its sole
/// writer. Each public operation is valid only in the states the step
/// state machine allows; anything else is rejected with
/// [`FlowError::InvalidStateTransition`] without mutating the attempt.
pub struct TransactionOrchestrator<T, F, O, P>
where
    T: TransactionService,
    F: FolioFormService,
    O: OtpService,
    P: PaymentGateway,
{
    transactions: T,
    folio_forms: F,
    otp: O,
    gateway: P,
    poll_config: PollConfig,
    attempts: RwLock<HashMap<AttemptId, Arc<AttemptSlot>>>,
}

enum PollFailure {
    NotPaid,
    Fatal(String),
}

impl<T, F, O, P> TransactionOrchestrator<T, F, O, P>
where
    T: TransactionService,
    F: FolioFormService,
    O: OtpService,
    P: PaymentGateway,
{
    /// Creates a new orchestrator over the four service clients, with the
    /// default payment-status polling configuration.
    pub fn new(transactions: T, folio_forms: F, otp: O, gateway: P) -> Self {
        Self::with_poll_config(transactions, folio_forms, otp, gateway, PollConfig::default())
    }

    /// Creates a new orchestrator with an explicit polling configuration.
    pub fn with_poll_config(
        transactions: T,
        folio_forms: F,
        otp: O,
        gateway: P,
        poll_config: PollConfig,
    ) -> Self {
        Self {
            transactions,
            folio_forms,
            otp,
            gateway,
            poll_config,
            attempts: RwLock::new(HashMap::new()),
        }
    }

    /// Begins a purchase attempt.
    ///
    /// Threshold violations are rejected locally and register nothing.
    /// Once registered, the initial selection submission is driven
    /// immediately; a step-local service failure there is recorded on the
    /// attempt (state stays `Configuring`, `last_error` set) and can be
    /// retried with [`submit`](Self::submit). The handle is returned
    /// either way so the attempt is never orphaned.
    #[tracing::instrument(skip_all, fields(amount = %request.amount))]
    pub async fn begin(
        &self,
        session: SessionContext,
        request: InvestmentRequest,
        thresholds: &FulfillmentThresholds,
    ) -> Result<AttemptHandle, FlowError> {
        thresholds.validate(&request)?;

        let attempt = TransactionAttempt::new(session, request);
        let handle = AttemptHandle {
            id: attempt.attempt_id(),
        };
        let slot = Arc::new(AttemptSlot {
            attempt: RwLock::new(attempt),
            busy: tokio::sync::Mutex::new(()),
            poll_cancel: Mutex::new(CancellationToken::new()),
        });
        self.attempts.write().unwrap().insert(handle.id, slot);

        metrics::counter!("purchase_attempts_total").increment(1);
        tracing::info!(attempt_id = %handle.id, "purchase attempt begun");

        if let Err(error) = self.submit(handle).await {
            tracing::warn!(attempt_id = %handle.id, %error, "initial submission failed");
        }
        Ok(handle)
    }

    /// Submits the purchase selection. Valid from `Configuring`; driven
    /// automatically by [`begin`](Self::begin) and exposed for retrying a
    /// failed initial submission under the same attempt id.
    #[tracing::instrument(skip(self))]
    pub async fn submit(&self, handle: AttemptHandle) -> Result<(), FlowError> {
        let slot = self.slot(handle)?;
        let _busy = Self::claim(&slot, "submit")?;
        self.guard(&slot, "submit", AttemptState::can_submit)?;

        let (attempt_id, session, request) = {
            let attempt = slot.attempt.read().unwrap();
            (
                attempt.attempt_id(),
                attempt.session().clone(),
                attempt.request().clone(),
            )
        };

        let response = match self
            .transactions
            .submit_selection(attempt_id, &session, &request)
            .await
        {
            Ok(response) => response,
            Err(error) => return Err(Self::record_step_error(&slot, error)),
        };

        let options = response.into_options();
        let unambiguous_new_folio = options.len() == 1 && options[0].is_new();
        {
            let mut attempt = slot.attempt.write().unwrap();
            attempt.clear_last_error();
            attempt.set_state(AttemptState::Submitted);
            attempt.set_folio_options(options);
            if unambiguous_new_folio {
                // Exactly one option and it opens a fresh folio: there is
                // no real choice to surface, so advance without user input.
                attempt.set_selected_folio(FolioChoice::New);
                attempt.set_state(AttemptState::FolioResolving);
            } else {
                attempt.set_state(AttemptState::FolioSelectionRequired);
            }
        }

        if unambiguous_new_folio {
            self.resolve_and_list(&slot).await?;
        }
        Ok(())
    }

    /// Records the folio choice and resolves it. Valid from
    /// `FolioSelectionRequired`.
    #[tracing::instrument(skip(self, choice))]
    pub async fn select_folio(
        &self,
        handle: AttemptHandle,
        choice: FolioChoice,
    ) -> Result<(), FlowError> {
        let slot = self.slot(handle)?;
        let _busy = Self::claim(&slot, "select_folio")?;
        self.guard(&slot, "select_folio", AttemptState::can_select_folio)?;

        {
            let mut attempt = slot.attempt.write().unwrap();
            match &choice {
                FolioChoice::Existing(number) => {
                    let offered = attempt.folio_options().iter().any(|option| {
                        matches!(option, FolioOption::Existing(f) if f.folio_number == *number)
                    });
                    if !offered {
                        return Err(ValidationError::new(
                            "folio_choice",
                            format!("folio {number} was not offered"),
                        )
                        .into());
                    }
                }
                FolioChoice::New => {
                    if !attempt.folio_options().iter().any(FolioOption::is_new) {
                        return Err(ValidationError::new(
                            "folio_choice",
                            "no new-folio template was offered",
                        )
                        .into());
                    }
                }
            }
            attempt.set_selected_folio(choice);
            attempt.set_state(AttemptState::FolioResolving);
        }

        self.resolve_and_list(&slot).await
    }

    /// Records the payment-method choice and issues the OTP challenge.
    /// Valid from `PaymentMethodPending`.
    #[tracing::instrument(skip(self))]
    pub async fn select_payment_method(
        &self,
        handle: AttemptHandle,
        method_id: &str,
    ) -> Result<(), FlowError> {
        let slot = self.slot(handle)?;
        let _busy = Self::claim(&slot, "select_payment_method")?;
        self.guard(
            &slot,
            "select_payment_method",
            AttemptState::can_select_payment_method,
        )?;

        let (user_id, method) = {
            let attempt = slot.attempt.read().unwrap();
            let method = attempt
                .payment_methods()
                .iter()
                .find(|m| m.id == method_id)
                .cloned()
                .ok_or_else(|| {
                    ValidationError::new(
                        "payment_method",
                        format!("method '{method_id}' is not offered"),
                    )
                })?;
            (attempt.session().user_id(), method)
        };

        let challenge = match self.otp.send(user_id).await {
            Ok(challenge) => challenge,
            Err(error) => return Err(Self::record_step_error(&slot, error)),
        };

        let mut attempt = slot.attempt.write().unwrap();
        attempt.clear_last_error();
        attempt.set_selected_payment_method(method);
        attempt.set_otp_challenge(challenge);
        attempt.set_state(AttemptState::OtpPending);
        Ok(())
    }

    /// Verifies the submitted OTP code and initiates the payment. Valid
    /// from `OtpPending`.
    ///
    /// A rejected code leaves the attempt in `OtpPending` with
    /// `last_error` set; another verify (or a resend) may follow. There
    /// is no verification-attempt cap.
    #[tracing::instrument(skip(self, code))]
    pub async fn submit_otp(&self, handle: AttemptHandle, code: &str) -> Result<(), FlowError> {
        let slot = self.slot(handle)?;
        let _busy = Self::claim(&slot, "submit_otp")?;
        self.guard(&slot, "submit_otp", AttemptState::can_submit_otp)?;

        if code.len() != 6 || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::new("otp_code", "must be exactly 6 digits").into());
        }

        let user_id = slot.attempt.read().unwrap().session().user_id();
        if let Err(error) = self.otp.verify(user_id, code).await {
            return Err(Self::record_step_error(&slot, error));
        }

        {
            let mut attempt = slot.attempt.write().unwrap();
            attempt.clear_last_error();
            attempt.set_state(AttemptState::PaymentInitiating);
        }
        self.initiate_payment(&slot).await
    }

    /// Reissues the OTP challenge. Valid from `OtpPending`; the fresh
    /// challenge supersedes the previous one and never counts against
    /// verification.
    #[tracing::instrument(skip(self))]
    pub async fn resend_otp(&self, handle: AttemptHandle) -> Result<(), FlowError> {
        let slot = self.slot(handle)?;
        let _busy = Self::claim(&slot, "resend_otp")?;
        self.guard(&slot, "resend_otp", AttemptState::can_resend_otp)?;

        let user_id = slot.attempt.read().unwrap().session().user_id();
        let challenge = match self.otp.resend(user_id).await {
            Ok(challenge) => challenge,
            Err(error) => return Err(Self::record_step_error(&slot, error)),
        };

        let mut attempt = slot.attempt.write().unwrap();
        attempt.clear_last_error();
        attempt.set_otp_challenge(challenge);
        Ok(())
    }

    /// Awaits payment confirmation, polling the gateway.
    ///
    /// Valid from `PaymentInitiating` (a failed initiation is re-driven
    /// first; the attempt id is the gateway's idempotency key, so this is
    /// safe), `PaymentInitiated` (first entry), and `PollingStatus`
    /// (resume after cancellation or a polling failure).
    ///
    /// Cancellation via [`cancel_polling`](Self::cancel_polling) stops
    /// probing immediately, surfaces as [`FlowError::Cancelled`], and
    /// leaves the attempt in `PollingStatus` so a later call can resume
    /// with the same gateway transaction id.
    #[tracing::instrument(skip(self))]
    pub async fn open_payment_and_await(
        &self,
        handle: AttemptHandle,
    ) -> Result<Outcome, FlowError> {
        let slot = self.slot(handle)?;
        let _busy = Self::claim(&slot, "open_payment_and_await")?;
        self.guard(&slot, "open_payment_and_await", AttemptState::can_open_payment)?;

        let needs_initiation = {
            let attempt = slot.attempt.read().unwrap();
            attempt.payment_initiation().is_none()
        };
        if needs_initiation {
            self.initiate_payment(&slot).await?;
        }

        let (gateway_transaction_id, order_id) = {
            let mut attempt = slot.attempt.write().unwrap();
            let initiation = attempt.payment_initiation().ok_or_else(|| {
                FlowError::Fatal("polling without a payment initiation".to_string())
            })?;
            let ids = (
                initiation.gateway_transaction_id.clone(),
                initiation.order_id.clone(),
            );
            attempt.set_state(AttemptState::PollingStatus);
            ids
        };

        // A fresh token per run: a cancelled run must not poison a resume.
        let cancel = CancellationToken::new();
        *slot.poll_cancel.lock().unwrap() = cancel.clone();

        let gateway = &self.gateway;
        let txn = gateway_transaction_id.clone();
        let result = poller::poll(&self.poll_config, &cancel, move |_attempt| {
            let txn = txn.clone();
            async move {
                match gateway.fetch_status(&txn).await {
                    Ok(PaymentStatus::Paid) => Probe::Settled(()),
                    Ok(PaymentStatus::NotPaid) => Probe::Halt(PollFailure::NotPaid),
                    Ok(PaymentStatus::Pending) => Probe::Retry,
                    Err(error) if error.is_retryable() => Probe::Retry,
                    Err(error) => Probe::Halt(PollFailure::Fatal(error.to_string())),
                }
            }
        })
        .await;

        match result {
            PollResult::Settled { attempts, .. } => {
                slot.attempt.write().unwrap().set_state(AttemptState::Completed);
                metrics::counter!("purchase_completed").increment(1);
                metrics::histogram!("payment_poll_attempts").record(attempts as f64);
                tracing::info!(attempt_id = %handle.id, attempts, "payment confirmed");
                Ok(Outcome::Completed(CompletionDetails {
                    gateway_transaction_id,
                    order_id,
                    poll_attempts: attempts,
                }))
            }
            PollResult::Halted {
                cause: PollFailure::NotPaid,
                attempts,
            } => {
                slot.attempt.write().unwrap().set_state(AttemptState::NotPaid);
                metrics::counter!("purchase_not_paid").increment(1);
                tracing::warn!(attempt_id = %handle.id, attempts, "payment not made");
                Ok(Outcome::NotPaid)
            }
            PollResult::Halted {
                cause: PollFailure::Fatal(reason),
                ..
            } => {
                let mut attempt = slot.attempt.write().unwrap();
                attempt.set_last_error(reason.clone());
                attempt.set_state(AttemptState::Failed);
                metrics::counter!("purchase_failed").increment(1);
                tracing::error!(attempt_id = %handle.id, %reason, "payment polling failed");
                Ok(Outcome::Failed(reason))
            }
            PollResult::Exhausted { attempts } => {
                slot.attempt.write().unwrap().set_state(AttemptState::TimedOut);
                metrics::counter!("purchase_timed_out").increment(1);
                tracing::warn!(attempt_id = %handle.id, attempts, "payment polling timed out");
                Ok(Outcome::TimedOut {
                    poll_attempts: attempts,
                })
            }
            PollResult::Cancelled { attempts } => {
                // Observation stopped; the payment itself is untouched and
                // the attempt stays recoverable in PollingStatus.
                tracing::info!(attempt_id = %handle.id, attempts, "payment polling cancelled");
                Err(FlowError::Cancelled)
            }
        }
    }

    /// Cancels an in-flight [`open_payment_and_await`] wait.
    ///
    /// Safe to call at any time, including while another call holds the
    /// attempt; a no-op when nothing is being polled.
    ///
    /// [`open_payment_and_await`]: Self::open_payment_and_await
    pub fn cancel_polling(&self, handle: AttemptHandle) -> Result<(), FlowError> {
        let slot = self.slot(handle)?;
        slot.poll_cancel.lock().unwrap().cancel();
        Ok(())
    }

    /// Returns a point-in-time snapshot of the attempt. Readers never
    /// contend with step serialization.
    pub fn attempt(&self, handle: AttemptHandle) -> Result<TransactionAttempt, FlowError> {
        let slot = self.slot(handle)?;
        let snapshot = slot.attempt.read().unwrap().clone();
        Ok(snapshot)
    }

    // Internal steps.

    /// Resolves the recorded folio choice and lists payment methods.
    ///
    /// Precondition: state is `FolioResolving` with a folio choice set.
    /// On a step-local failure the attempt falls back to
    /// `FolioSelectionRequired` so the choice can simply be made again.
    async fn resolve_and_list(&self, slot: &AttemptSlot) -> Result<(), FlowError> {
        let (attempt_id, choice, template) = {
            let attempt = slot.attempt.read().unwrap();
            let template: Option<NewFolioTemplate> =
                attempt.folio_options().iter().find_map(|option| match option {
                    FolioOption::New(t) => Some(t.clone()),
                    FolioOption::Existing(_) => None,
                });
            (
                attempt.attempt_id(),
                attempt.selected_folio().cloned(),
                template,
            )
        };

        if matches!(choice, Some(FolioChoice::New)) {
            let template = template.ok_or_else(|| {
                FlowError::Fatal("new-folio choice without an offered template".to_string())
            })?;
            match self.folio_forms.resolve_new_folio(attempt_id, &template).await {
                Ok(resolution) => {
                    slot.attempt.write().unwrap().set_folio_resolution(resolution);
                }
                Err(error) => {
                    return Err(Self::record_folio_step_error(slot, error));
                }
            }
        }

        let submission_id = {
            let attempt = slot.attempt.read().unwrap();
            attempt
                .folio_resolution()
                .map(|r| r.submission_id.clone())
        };

        let methods = match self
            .transactions
            .list_payment_methods(attempt_id, submission_id.as_deref())
            .await
        {
            Ok(methods) => methods,
            Err(error) => return Err(Self::record_folio_step_error(slot, error)),
        };

        let mut attempt = slot.attempt.write().unwrap();
        attempt.clear_last_error();
        attempt.set_payment_methods(methods);
        attempt.set_state(AttemptState::PaymentMethodPending);
        Ok(())
    }

    /// Initiates the payment with the gateway.
    ///
    /// Precondition: OTP verified (state `PaymentInitiating`, or a resume
    /// from `open_payment_and_await`). On a step-local failure the state
    /// stays `PaymentInitiating` for a later re-drive.
    async fn initiate_payment(&self, slot: &AttemptSlot) -> Result<(), FlowError> {
        let (attempt_id, method, folio) = {
            let attempt = slot.attempt.read().unwrap();
            let method = attempt.selected_payment_method().cloned().ok_or_else(|| {
                FlowError::Fatal("payment initiation without a selected method".to_string())
            })?;
            let folio = attempt.folio_reference().ok_or_else(|| {
                FlowError::Fatal("payment initiation without a resolved folio".to_string())
            })?;
            (attempt.attempt_id(), method, folio)
        };

        let initiation = match self.gateway.initiate(attempt_id, &method, &folio).await {
            Ok(initiation) => initiation,
            Err(error) => return Err(Self::record_step_error(slot, error)),
        };

        let mut attempt = slot.attempt.write().unwrap();
        attempt.clear_last_error();
        attempt.set_payment_initiation(initiation);
        attempt.set_state(AttemptState::PaymentInitiated);
        Ok(())
    }

    // Bookkeeping helpers.

    fn slot(&self, handle: AttemptHandle) -> Result<Arc<AttemptSlot>, FlowError> {
        self.attempts
            .read()
            .unwrap()
            .get(&handle.id)
            .cloned()
            .ok_or(FlowError::UnknownAttempt(handle.id))
    }

    /// Claims the per-attempt serialization guard without waiting.
    fn claim<'a>(
        slot: &'a AttemptSlot,
        operation: &'static str,
    ) -> Result<tokio::sync::MutexGuard<'a, ()>, FlowError> {
        slot.busy
            .try_lock()
            .map_err(|_| FlowError::ConcurrentCall { operation })
    }

    /// Rejects the operation unless the attempt's state permits it.
    fn guard(
        &self,
        slot: &AttemptSlot,
        operation: &'static str,
        permitted: impl Fn(&AttemptState) -> bool,
    ) -> Result<(), FlowError> {
        let state = slot.attempt.read().unwrap().state();
        if permitted(&state) {
            Ok(())
        } else {
            Err(FlowError::InvalidStateTransition { operation, state })
        }
    }

    /// Records a step-local service failure without moving the state, so
    /// the same call can be retried; a fatal error moves to `Failed`.
    fn record_step_error(slot: &AttemptSlot, error: ServiceError) -> FlowError {
        let mut attempt = slot.attempt.write().unwrap();
        attempt.set_last_error(error.to_string());
        if error.is_fatal() {
            attempt.set_state(AttemptState::Failed);
            metrics::counter!("purchase_failed").increment(1);
            FlowError::Fatal(error.to_string())
        } else {
            FlowError::Service(error)
        }
    }

    /// Like [`record_step_error`], but rolls the state back to
    /// `FolioSelectionRequired` so the folio choice can be re-made.
    ///
    /// [`record_step_error`]: Self::record_step_error
    fn record_folio_step_error(slot: &AttemptSlot, error: ServiceError) -> FlowError {
        let mut attempt = slot.attempt.write().unwrap();
        attempt.set_last_error(error.to_string());
        if error.is_fatal() {
            attempt.set_state(AttemptState::Failed);
            metrics::counter!("purchase_failed").increment(1);
            FlowError::Fatal(error.to_string())
        } else {
            attempt.set_state(AttemptState::FolioSelectionRequired);
            FlowError::Service(error)
        }
    }
}

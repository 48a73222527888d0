//! The mutable session object for one purchase attempt.

use common::AttemptId;
use serde::{Deserialize, Serialize};

use crate::model::{
    FolioChoice, FolioOption, FolioReference, FolioResolution, OtpChallenge, PaymentInitiation,
    PaymentMethod,
};
use crate::request::InvestmentRequest;
use crate::session::SessionContext;
use crate::state::AttemptState;

/// One end-to-end run of the purchase flow.
///
/// Owned exclusively by the orchestrator, which is the sole writer; all
/// other components receive it by read reference. Mutation is
/// append-only-by-field: received values are replaced whole, never edited
/// in place, so a reader holding a snapshot never observes a torn value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionAttempt {
    attempt_id: AttemptId,
    session: SessionContext,
    request: InvestmentRequest,
    state: AttemptState,
    folio_options: Vec<FolioOption>,
    selected_folio: Option<FolioChoice>,
    folio_resolution: Option<FolioResolution>,
    payment_methods: Vec<PaymentMethod>,
    selected_payment_method: Option<PaymentMethod>,
    otp_challenge: Option<OtpChallenge>,
    payment_initiation: Option<PaymentInitiation>,
    last_error: Option<String>,
}

impl TransactionAttempt {
    /// Creates a fresh attempt in `Configuring` with a new attempt id.
    pub fn new(session: SessionContext, request: InvestmentRequest) -> Self {
        Self {
            attempt_id: AttemptId::new(),
            session,
            request,
            state: AttemptState::Configuring,
            folio_options: Vec::new(),
            selected_folio: None,
            folio_resolution: None,
            payment_methods: Vec::new(),
            selected_payment_method: None,
            otp_challenge: None,
            payment_initiation: None,
            last_error: None,
        }
    }

    /// Returns the idempotency key for every downstream call.
    pub fn attempt_id(&self) -> AttemptId {
        self.attempt_id
    }

    /// Returns the session context the attempt runs under.
    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Returns the validated purchase request.
    pub fn request(&self) -> &InvestmentRequest {
        &self.request
    }

    /// Returns the current step state.
    pub fn state(&self) -> AttemptState {
        self.state
    }

    /// Returns the folio options from the submit response.
    pub fn folio_options(&self) -> &[FolioOption] {
        &self.folio_options
    }

    /// Returns the folio choice, once made.
    pub fn selected_folio(&self) -> Option<&FolioChoice> {
        self.selected_folio.as_ref()
    }

    /// Returns the folio-form resolution for a new-folio choice.
    pub fn folio_resolution(&self) -> Option<&FolioResolution> {
        self.folio_resolution.as_ref()
    }

    /// Returns the payment methods offered for the attempt.
    pub fn payment_methods(&self) -> &[PaymentMethod] {
        &self.payment_methods
    }

    /// Returns the chosen payment method, once selected.
    pub fn selected_payment_method(&self) -> Option<&PaymentMethod> {
        self.selected_payment_method.as_ref()
    }

    /// Returns the current OTP challenge, if one has been issued.
    pub fn otp_challenge(&self) -> Option<&OtpChallenge> {
        self.otp_challenge.as_ref()
    }

    /// Returns the payment initiation, once the gateway accepted it.
    pub fn payment_initiation(&self) -> Option<&PaymentInitiation> {
        self.payment_initiation.as_ref()
    }

    /// Returns the most recent step-local error, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Returns the folio the payment is initiated against, once both the
    /// choice and (for new folios) the resolution are in place.
    pub fn folio_reference(&self) -> Option<FolioReference> {
        match self.selected_folio.as_ref()? {
            FolioChoice::Existing(number) => Some(FolioReference::Existing(number.clone())),
            FolioChoice::New => self.folio_resolution.clone().map(FolioReference::Resolved),
        }
    }

    // Mutators, driven only by the orchestrator. Transition legality is
    // checked there against the `can_*` predicates before anything below
    // is called.

    /// Moves the attempt to a new step state.
    pub fn set_state(&mut self, state: AttemptState) {
        self.state = state;
    }

    /// Records the folio options from the submit response.
    pub fn set_folio_options(&mut self, options: Vec<FolioOption>) {
        self.folio_options = options;
    }

    /// Records the folio choice.
    pub fn set_selected_folio(&mut self, choice: FolioChoice) {
        self.selected_folio = Some(choice);
    }

    /// Records the folio-form resolution.
    pub fn set_folio_resolution(&mut self, resolution: FolioResolution) {
        self.folio_resolution = Some(resolution);
    }

    /// Records the offered payment methods.
    pub fn set_payment_methods(&mut self, methods: Vec<PaymentMethod>) {
        self.payment_methods = methods;
    }

    /// Records the chosen payment method.
    pub fn set_selected_payment_method(&mut self, method: PaymentMethod) {
        self.selected_payment_method = Some(method);
    }

    /// Replaces the OTP challenge with a fresh one (a resend supersedes,
    /// it never mutates the previous challenge).
    pub fn set_otp_challenge(&mut self, challenge: OtpChallenge) {
        self.otp_challenge = Some(challenge);
    }

    /// Records the accepted payment initiation.
    pub fn set_payment_initiation(&mut self, initiation: PaymentInitiation) {
        self.payment_initiation = Some(initiation);
    }

    /// Records a step-local error.
    pub fn set_last_error(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
    }

    /// Clears the step-local error after a successful retry.
    pub fn clear_last_error(&mut self) {
        self.last_error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FolioNumber, PaymentStatus};
    use crate::request::{Amount, FulfillmentId, InvestmentKind, ItemId, ProviderId, TaxId};
    use common::UserId;

    fn attempt() -> TransactionAttempt {
        TransactionAttempt::new(
            SessionContext::new(UserId::new(), TaxId::new("ABCDE1234F")),
            InvestmentRequest {
                kind: InvestmentKind::Lumpsum,
                amount: Amount::new(5_000),
                fulfillment_id: FulfillmentId::new("F1"),
                customer_tax_id: TaxId::new("ABCDE1234F"),
                provider_id: ProviderId::new("fh-1"),
                item_id: ItemId::new("scheme-1"),
            },
        )
    }

    #[test]
    fn test_new_attempt_starts_configuring() {
        let attempt = attempt();
        assert_eq!(attempt.state(), AttemptState::Configuring);
        assert!(attempt.folio_options().is_empty());
        assert!(attempt.last_error().is_none());
        assert!(attempt.folio_reference().is_none());
    }

    #[test]
    fn test_attempt_ids_are_unique() {
        assert_ne!(attempt().attempt_id(), attempt().attempt_id());
    }

    #[test]
    fn test_folio_reference_existing() {
        let mut attempt = attempt();
        attempt.set_selected_folio(FolioChoice::Existing(FolioNumber::new("123/45")));
        assert_eq!(
            attempt.folio_reference(),
            Some(FolioReference::Existing(FolioNumber::new("123/45")))
        );
    }

    #[test]
    fn test_folio_reference_new_requires_resolution() {
        let mut attempt = attempt();
        attempt.set_selected_folio(FolioChoice::New);
        assert!(attempt.folio_reference().is_none());

        let resolution = FolioResolution {
            submission_id: "SUB-1".to_string(),
            external_transaction_id: "EXT-1".to_string(),
        };
        attempt.set_folio_resolution(resolution.clone());
        assert_eq!(
            attempt.folio_reference(),
            Some(FolioReference::Resolved(resolution))
        );
    }

    #[test]
    fn test_otp_challenge_superseded_not_mutated() {
        let mut attempt = attempt();
        let first = OtpChallenge {
            destination_masked: "99*****210".to_string(),
            expires_in_seconds: 120,
            issued_at: chrono::Utc::now(),
        };
        attempt.set_otp_challenge(first.clone());

        let second = OtpChallenge {
            issued_at: first.issued_at + chrono::Duration::seconds(30),
            ..first.clone()
        };
        attempt.set_otp_challenge(second.clone());
        assert_eq!(attempt.otp_challenge(), Some(&second));
    }

    #[test]
    fn test_last_error_set_and_cleared() {
        let mut attempt = attempt();
        attempt.set_last_error("rejected: invalid code");
        assert_eq!(attempt.last_error(), Some("rejected: invalid code"));
        attempt.clear_last_error();
        assert!(attempt.last_error().is_none());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let mut attempt = attempt();
        attempt.set_state(AttemptState::PollingStatus);
        attempt.set_payment_initiation(PaymentInitiation {
            gateway_transaction_id: "TX1".to_string(),
            payment_url: "https://pay.example/TX1".to_string(),
            order_id: "ORD-1".to_string(),
            initial_status: PaymentStatus::Pending,
        });

        let json = serde_json::to_string(&attempt).unwrap();
        let deserialized: TransactionAttempt = serde_json::from_str(&json).unwrap();
        assert_eq!(attempt, deserialized);
    }
}

//! Step state machine for one purchase attempt.

use serde::{Deserialize, Serialize};

/// Where a single purchase attempt currently stands.
///
/// State transitions:
/// ```text
/// Configuring ──► Submitted ──┬──► FolioSelectionRequired ──► FolioResolving
///                             └──────────────────────────────────┘ │
///                                                                  ▼
///        OtpPending ◄── PaymentMethodPending ◄─────────────────────┘
///             │
///             ▼
///  PaymentInitiating ──► PaymentInitiated ──► PollingStatus ──┬──► Completed
///                                                             ├──► NotPaid
///                                                             └──► TimedOut
/// ```
/// Any step may additionally transition to `Failed` on a non-retryable
/// service error. The failure reason itself lives on the attempt, not on
/// the state, so the state stays a plain copyable tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AttemptState {
    /// Request captured, thresholds checked, nothing submitted yet.
    #[default]
    Configuring,

    /// Selection submitted to the transaction service.
    Submitted,

    /// The submit response carried more than one real choice; an explicit
    /// folio choice is required.
    FolioSelectionRequired,

    /// A folio choice was made (or was unambiguous) and is being resolved.
    FolioResolving,

    /// Folio resolved; a payment method must be chosen.
    PaymentMethodPending,

    /// OTP challenge issued; awaiting a verify or resend.
    OtpPending,

    /// OTP verified; payment initiation with the gateway in progress.
    PaymentInitiating,

    /// Gateway accepted the initiation; polling has not started.
    PaymentInitiated,

    /// Awaiting payment confirmation from the gateway.
    PollingStatus,

    /// Payment confirmed (terminal state).
    Completed,

    /// Gateway reported the payment was not made (terminal state).
    NotPaid,

    /// Status polling exhausted its attempt budget (terminal state).
    TimedOut,

    /// Non-retryable service error; a fresh attempt is required
    /// (terminal state).
    Failed,
}

impl AttemptState {
    /// Returns true if the selection can be submitted in this state.
    pub fn can_submit(&self) -> bool {
        matches!(self, AttemptState::Configuring)
    }

    /// Returns true if a folio can be chosen in this state.
    pub fn can_select_folio(&self) -> bool {
        matches!(self, AttemptState::FolioSelectionRequired)
    }

    /// Returns true if a payment method can be chosen in this state.
    pub fn can_select_payment_method(&self) -> bool {
        matches!(self, AttemptState::PaymentMethodPending)
    }

    /// Returns true if an OTP code can be verified in this state.
    pub fn can_submit_otp(&self) -> bool {
        matches!(self, AttemptState::OtpPending)
    }

    /// Returns true if the OTP challenge can be reissued in this state.
    pub fn can_resend_otp(&self) -> bool {
        matches!(self, AttemptState::OtpPending)
    }

    /// Returns true if payment confirmation can be awaited in this state.
    ///
    /// `PaymentInitiating` is included so a failed initiation can be
    /// safely re-driven (the attempt id makes re-initiation idempotent),
    /// and `PollingStatus` so a cancelled or interrupted wait can resume.
    pub fn can_open_payment(&self) -> bool {
        matches!(
            self,
            AttemptState::PaymentInitiating
                | AttemptState::PaymentInitiated
                | AttemptState::PollingStatus
        )
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AttemptState::Completed
                | AttemptState::NotPaid
                | AttemptState::TimedOut
                | AttemptState::Failed
        )
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptState::Configuring => "Configuring",
            AttemptState::Submitted => "Submitted",
            AttemptState::FolioSelectionRequired => "FolioSelectionRequired",
            AttemptState::FolioResolving => "FolioResolving",
            AttemptState::PaymentMethodPending => "PaymentMethodPending",
            AttemptState::OtpPending => "OtpPending",
            AttemptState::PaymentInitiating => "PaymentInitiating",
            AttemptState::PaymentInitiated => "PaymentInitiated",
            AttemptState::PollingStatus => "PollingStatus",
            AttemptState::Completed => "Completed",
            AttemptState::NotPaid => "NotPaid",
            AttemptState::TimedOut => "TimedOut",
            AttemptState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for AttemptState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

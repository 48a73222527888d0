//! Values received from the collaborator services during an attempt.
//!
//! All types here are immutable once received: the orchestrator replaces
//! whole values on the attempt rather than mutating them in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A fund-house folio number under which units are held.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FolioNumber(String);

impl FolioNumber {
    /// Creates a new folio number from a string.
    pub fn new(number: impl Into<String>) -> Self {
        Self(number.into())
    }

    /// Returns the folio number as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FolioNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FolioNumber {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// An existing folio offered for the purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingFolio {
    pub folio_number: FolioNumber,
    pub holder_name: String,
    pub masked_email: String,
    pub masked_mobile: String,
}

/// A template for opening a fresh folio via the folio-form service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFolioTemplate {
    /// URL the folio-form service resolves the new folio through.
    pub form_url: String,
    /// Identifier of the form template.
    pub form_id: String,
}

/// One selectable folio option from the submit-selection response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FolioOption {
    /// Purchase into an existing folio.
    Existing(ExistingFolio),
    /// Open a fresh folio first.
    New(NewFolioTemplate),
}

impl FolioOption {
    /// Returns true if this option opens a fresh folio.
    pub fn is_new(&self) -> bool {
        matches!(self, FolioOption::New(_))
    }
}

/// The folio choice made for the attempt (by the user, or automatically
/// when the submit response is unambiguous).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FolioChoice {
    /// Use an existing folio.
    Existing(FolioNumber),
    /// Open a fresh folio through the offered template.
    New,
}

/// Result of resolving a new folio through the folio-form service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolioResolution {
    /// Identifier of the submitted folio form.
    pub submission_id: String,
    /// External transaction id assigned by the folio-form service.
    pub external_transaction_id: String,
}

/// The folio the payment is initiated against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FolioReference {
    /// An existing folio, by number.
    Existing(FolioNumber),
    /// A freshly opened folio, by its form submission.
    Resolved(FolioResolution),
}

/// A payment method offered for the attempt.
///
/// Methods with no authentication mode are filtered out at the client
/// boundary and never stored, so `auth_mode` is always present here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
    /// Payment mode (e.g. net banking, UPI, mandate).
    pub mode: String,
    /// Authentication mode required by the method.
    pub auth_mode: String,
    /// Standing-authorization limit for mandate-backed methods.
    pub mandate_limit: Option<crate::request::Amount>,
    /// Which party collects the payment.
    pub collected_by: String,
    /// Backend-owned method type tag.
    pub method_type: String,
}

/// Metadata for an issued one-time passcode challenge.
///
/// A resend supersedes the previous challenge with a fresh value; the old
/// challenge is replaced, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpChallenge {
    /// Masked destination the code was sent to.
    pub destination_masked: String,
    /// Validity window reported by the OTP service.
    pub expires_in_seconds: u32,
    /// When this challenge was issued.
    pub issued_at: DateTime<Utc>,
}

/// Result of initiating a payment with the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInitiation {
    /// Gateway-assigned transaction id, the key for all status polling.
    pub gateway_transaction_id: String,
    /// URL the user completes the payment at.
    pub payment_url: String,
    /// Gateway order id.
    pub order_id: String,
    /// Status reported at initiation time.
    pub initial_status: PaymentStatus,
}

/// Payment status as reported by the gateway.
///
/// Note the wire spelling of the failure arm is `NOT-PAID`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "PAID")]
    Paid,
    #[serde(rename = "NOT-PAID")]
    NotPaid,
}

impl PaymentStatus {
    /// Returns the wire spelling of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::NotPaid => "NOT-PAID",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

//! The validated purchase request and its value objects.

use serde::{Deserialize, Serialize};

/// A purchase amount in whole currency units.
///
/// Amounts in this flow carry no minor units (the backend contract deals
/// in whole rupees), so a plain unsigned integer newtype is sufficient.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    /// Creates an amount from whole currency units.
    pub fn new(units: u64) -> Self {
        Self(units)
    }

    /// Returns the amount in whole currency units.
    pub fn units(&self) -> u64 {
        self.0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Returns true if this amount is an exact multiple of `other`.
    ///
    /// A zero `other` never divides anything.
    pub fn is_multiple_of(&self, other: Amount) -> bool {
        other.0 != 0 && self.0 % other.0 == 0
    }

    /// Multiplies by an installment count, saturating on overflow.
    pub fn cumulative(&self, installments: u32) -> Amount {
        Amount(self.0.saturating_mul(installments as u64))
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Amount {
    fn from(units: u64) -> Self {
        Self(units)
    }
}

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from a string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id! {
    /// Opaque identifier selecting the product's fee/threshold tier.
    FulfillmentId
}

string_id! {
    /// Identifier of the fund house offering the product.
    ProviderId
}

string_id! {
    /// Identifier of the purchased product (scheme/plan).
    ItemId
}

string_id! {
    /// Opaque national tax identifier of the customer.
    TaxId
}

/// Recurrence frequency for SIP purchases.
///
/// Monthly is the only frequency offered by the backend contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Frequency {
    #[default]
    Monthly,
}

impl Frequency {
    /// Returns the wire spelling of the frequency.
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Monthly => "MONTHLY",
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Recurrence schedule for a SIP purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SipSchedule {
    /// Number of installments to be collected.
    pub installment_count: u32,
    /// Day of month (1-28) each installment is collected.
    pub recurrence_day: u8,
    /// Collection frequency.
    pub frequency: Frequency,
}

/// The kind of purchase being made, with kind-specific parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvestmentKind {
    /// One-shot purchase of the full amount.
    Lumpsum,
    /// Recurring purchase collected on a schedule.
    Sip(SipSchedule),
}

impl InvestmentKind {
    /// Returns the SIP schedule, if this is a recurring purchase.
    pub fn sip_schedule(&self) -> Option<&SipSchedule> {
        match self {
            InvestmentKind::Lumpsum => None,
            InvestmentKind::Sip(schedule) => Some(schedule),
        }
    }
}

/// A pre-validated purchase request, produced by the form collector.
///
/// Field-level input formats (PAN, phone, etc.) are validated by the form
/// collector before this value is constructed; the orchestrator only
/// re-checks the fulfillment-threshold invariants before submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestmentRequest {
    /// Lump-sum or SIP, with kind-specific parameters.
    pub kind: InvestmentKind,
    /// Purchase amount (per installment, for SIP).
    pub amount: Amount,
    /// Fee/threshold tier the purchase is made under.
    pub fulfillment_id: FulfillmentId,
    /// Customer's national tax identifier.
    pub customer_tax_id: TaxId,
    /// Fund house offering the product.
    pub provider_id: ProviderId,
    /// The purchased product.
    pub item_id: ItemId,
}

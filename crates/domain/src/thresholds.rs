//! Per-fulfillment purchase thresholds and pre-submission invariant checks.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::request::{Amount, InvestmentKind, InvestmentRequest};

/// Purchase thresholds for one fulfillment tier, supplied by the
/// product catalog collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentThresholds {
    /// Minimum per-purchase (or per-installment) amount.
    pub min_amount: Amount,
    /// Maximum per-purchase (or per-installment) amount.
    pub max_amount: Amount,
    /// Required amount granularity for lump-sum purchases, when specified.
    pub amount_multiple: Option<Amount>,
    /// Minimum SIP installment count.
    pub min_installments: u32,
    /// Maximum SIP installment count.
    pub max_installments: u32,
    /// Minimum total committed across all SIP installments.
    pub cumulative_min_amount: Amount,
    /// Recurrence days the fulfillment accepts, when restricted.
    pub allowed_recurrence_days: Option<Vec<u8>>,
}

impl FulfillmentThresholds {
    /// Checks the request against this tier's invariants.
    ///
    /// Violations never reach a service call; the first failing field is
    /// reported. For SIP the per-installment amount, installment count,
    /// recurrence day, and cumulative commitment are all checked; for
    /// lump-sum the amount range and granularity.
    pub fn validate(&self, request: &InvestmentRequest) -> Result<(), ValidationError> {
        if request.amount.is_zero() {
            return Err(ValidationError::new("amount", "amount must be positive"));
        }
        if request.amount < self.min_amount {
            return Err(ValidationError::new(
                "amount",
                format!("below minimum of {}", self.min_amount),
            ));
        }
        if request.amount > self.max_amount {
            return Err(ValidationError::new(
                "amount",
                format!("above maximum of {}", self.max_amount),
            ));
        }

        match &request.kind {
            InvestmentKind::Lumpsum => {
                if let Some(multiple) = self.amount_multiple {
                    if !request.amount.is_multiple_of(multiple) {
                        return Err(ValidationError::new(
                            "amount",
                            format!("must be a multiple of {multiple}"),
                        ));
                    }
                }
            }
            InvestmentKind::Sip(schedule) => {
                if schedule.installment_count < self.min_installments {
                    return Err(ValidationError::new(
                        "installment_count",
                        format!("below minimum of {}", self.min_installments),
                    ));
                }
                if schedule.installment_count > self.max_installments {
                    return Err(ValidationError::new(
                        "installment_count",
                        format!("above maximum of {}", self.max_installments),
                    ));
                }
                if !(1..=28).contains(&schedule.recurrence_day) {
                    return Err(ValidationError::new(
                        "recurrence_day",
                        "must be between 1 and 28",
                    ));
                }
                if let Some(allowed) = &self.allowed_recurrence_days {
                    if !allowed.contains(&schedule.recurrence_day) {
                        return Err(ValidationError::new(
                            "recurrence_day",
                            "not offered by this fulfillment",
                        ));
                    }
                }
                let committed = request.amount.cumulative(schedule.installment_count);
                if committed < self.cumulative_min_amount {
                    return Err(ValidationError::new(
                        "amount",
                        format!(
                            "total commitment {committed} below cumulative minimum of {}",
                            self.cumulative_min_amount
                        ),
                    ));
                }
            }
        }

        Ok(())
    }
}

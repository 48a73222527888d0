//! Terminal outcomes of a purchase attempt.

/// Details reported with a confirmed payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionDetails {
    /// Gateway transaction id the payment completed under.
    pub gateway_transaction_id: String,
    /// Gateway order id.
    pub order_id: String,
    /// Number of status polls it took to observe the confirmation.
    pub poll_attempts: u32,
}

/// Terminal result of awaiting payment confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Payment confirmed.
    Completed(CompletionDetails),
    /// The gateway reported the payment was not made.
    NotPaid,
    /// Polling exhausted its attempt budget without a terminal status.
    /// The attempt count is reported for observability.
    TimedOut { poll_attempts: u32 },
    /// A non-retryable failure ended the attempt.
    Failed(String),
}

impl Outcome {
    /// Returns the outcome name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Completed(_) => "Completed",
            Outcome::NotPaid => "NotPaid",
            Outcome::TimedOut { .. } => "TimedOut",
            Outcome::Failed(_) => "Failed",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

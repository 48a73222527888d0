//! Transaction orchestrator for fund purchases.
//!
//! Drives a lump-sum or SIP purchase attempt through selection submission,
//! folio resolution, payment-method selection, OTP verification, payment
//! initiation, and asynchronous payment-status confirmation against four
//! independent external services that share no transaction boundary.
//!
//! The orchestrator owns one [`domain::TransactionAttempt`] per attempt,
//! is its sole writer, and serializes all step calls for a given handle;
//! the bounded [`poller`] confirms payment status and is cancellable
//! mid-wait without losing the attempt.

pub mod coordinator;
pub mod error;
pub mod outcome;
pub mod poller;

pub use coordinator::{AttemptHandle, TransactionOrchestrator};
pub use error::FlowError;
pub use outcome::{CompletionDetails, Outcome};
pub use poller::{PollConfig, PollResult, Probe, poll};

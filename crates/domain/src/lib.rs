//! Domain layer for the purchase orchestration flow.
//!
//! This crate provides the pure data model with no I/O:
//! - `InvestmentRequest` and its value objects
//! - `FulfillmentThresholds` with pre-submission invariant checks
//! - `AttemptState` step state machine
//! - `TransactionAttempt` session object

pub mod attempt;
pub mod error;
pub mod model;
pub mod request;
pub mod session;
pub mod state;
pub mod thresholds;

pub use attempt::TransactionAttempt;
pub use error::ValidationError;
pub use model::{
    ExistingFolio, FolioChoice, FolioNumber, FolioOption, FolioReference, FolioResolution,
    NewFolioTemplate, OtpChallenge, PaymentInitiation, PaymentMethod, PaymentStatus,
};
pub use request::{
    Amount, Frequency, FulfillmentId, InvestmentKind, InvestmentRequest, ItemId, ProviderId,
    SipSchedule, TaxId,
};
pub use session::SessionContext;
pub use state::AttemptState;
pub use thresholds::FulfillmentThresholds;

//! External service clients for the purchase flow.
//!
//! One `async_trait` trait per collaborator service, each exposing exactly
//! one idempotent operation per orchestration step:
//! - [`TransactionService`]: submit selection, list payment methods
//! - [`FolioFormService`]: resolve a new folio
//! - [`OtpService`]: send, verify, and resend one-time passcodes
//! - [`PaymentGateway`]: initiate payment, fetch payment status
//!
//! Clients never retry internally; retry policy belongs to the
//! orchestrator and its polling engine. Each trait has an HTTP/JSON
//! implementation and an in-memory double for tests.

pub mod config;
pub mod error;
pub mod folio;
pub mod gateway;
pub mod http;
pub mod otp;
pub mod transaction;

pub use config::ServiceEndpoints;
pub use error::ServiceError;
pub use folio::{FolioFormService, InMemoryFolioFormService};
pub use gateway::{InMemoryPaymentGateway, PaymentGateway};
pub use http::{
    HttpFolioFormService, HttpOtpService, HttpPaymentGateway, HttpTransactionService,
    build_clients,
};
pub use otp::{InMemoryOtpService, OtpService};
pub use transaction::{InMemoryTransactionService, SubmitResponse, TransactionService};

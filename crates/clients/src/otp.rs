//! OTP service trait and in-memory implementation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use common::UserId;
use domain::OtpChallenge;

use crate::error::ServiceError;

/// Trait for the one-time-passcode service.
#[async_trait]
pub trait OtpService: Send + Sync {
    /// Sends a fresh OTP challenge to the user's registered destination.
    async fn send(&self, user_id: UserId) -> Result<OtpChallenge, ServiceError>;

    /// Verifies a submitted code. Rejection carries the service's reason.
    async fn verify(&self, user_id: UserId, code: &str) -> Result<(), ServiceError>;

    /// Reissues the challenge. Supersedes the previous one and does not
    /// count against verification attempts.
    async fn resend(&self, user_id: UserId) -> Result<OtpChallenge, ServiceError>;
}

#[derive(Debug)]
struct InMemoryOtpState {
    accepted_code: String,
    fail_on_send: Option<ServiceError>,
    send_calls: u32,
    resend_calls: u32,
    verify_calls: u32,
}

impl Default for InMemoryOtpState {
    fn default() -> Self {
        Self {
            accepted_code: "123456".to_string(),
            fail_on_send: None,
            send_calls: 0,
            resend_calls: 0,
            verify_calls: 0,
        }
    }
}

/// In-memory OTP service for testing. Accepts a single configured code
/// (default `"123456"`) and rejects everything else.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOtpService {
    state: Arc<RwLock<InMemoryOtpState>>,
}

impl InMemoryOtpService {
    /// Creates a new in-memory OTP service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the code that verification accepts.
    pub fn set_accepted_code(&self, code: impl Into<String>) {
        self.state.write().unwrap().accepted_code = code.into();
    }

    /// Configures send/resend to fail with the given error.
    pub fn set_fail_on_send(&self, error: Option<ServiceError>) {
        self.state.write().unwrap().fail_on_send = error;
    }

    /// Returns how many initial sends were requested.
    pub fn send_calls(&self) -> u32 {
        self.state.read().unwrap().send_calls
    }

    /// Returns how many resends were requested.
    pub fn resend_calls(&self) -> u32 {
        self.state.read().unwrap().resend_calls
    }

    /// Returns how many verifications were attempted.
    pub fn verify_calls(&self) -> u32 {
        self.state.read().unwrap().verify_calls
    }
}

fn fresh_challenge() -> OtpChallenge {
    OtpChallenge {
        destination_masked: "99*****210".to_string(),
        expires_in_seconds: 180,
        issued_at: Utc::now(),
    }
}

#[async_trait]
impl OtpService for InMemoryOtpService {
    async fn send(&self, _user_id: UserId) -> Result<OtpChallenge, ServiceError> {
        let mut state = self.state.write().unwrap();
        state.send_calls += 1;
        if let Some(error) = state.fail_on_send.clone() {
            return Err(error);
        }
        Ok(fresh_challenge())
    }

    async fn verify(&self, _user_id: UserId, code: &str) -> Result<(), ServiceError> {
        let mut state = self.state.write().unwrap();
        state.verify_calls += 1;
        if code == state.accepted_code {
            Ok(())
        } else {
            Err(ServiceError::rejected("invalid code"))
        }
    }

    async fn resend(&self, _user_id: UserId) -> Result<OtpChallenge, ServiceError> {
        let mut state = self.state.write().unwrap();
        state.resend_calls += 1;
        if let Some(error) = state.fail_on_send.clone() {
            return Err(error);
        }
        Ok(fresh_challenge())
    }
}

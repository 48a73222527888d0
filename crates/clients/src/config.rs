//! Service endpoint configuration loaded from environment variables.

use std::time::Duration;

/// Base URLs for the four collaborator services, with per-call timeout.
///
/// Reads from environment variables:
/// - `TRANSACTION_SERVICE_URL` (default: `http://localhost:8081`)
/// - `FOLIO_FORM_SERVICE_URL` (default: `http://localhost:8082`)
/// - `OTP_SERVICE_URL` (default: `http://localhost:8083`)
/// - `PAYMENT_GATEWAY_URL` (default: `http://localhost:8084`)
/// - `SERVICE_TIMEOUT_SECS`: per-call network timeout (default: `10`)
#[derive(Debug, Clone)]
pub struct ServiceEndpoints {
    pub transaction_url: String,
    pub folio_form_url: String,
    pub otp_url: String,
    pub gateway_url: String,
    pub request_timeout: Duration,
}

impl ServiceEndpoints {
    /// Loads endpoints from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            transaction_url: std::env::var("TRANSACTION_SERVICE_URL")
                .unwrap_or(defaults.transaction_url),
            folio_form_url: std::env::var("FOLIO_FORM_SERVICE_URL")
                .unwrap_or(defaults.folio_form_url),
            otp_url: std::env::var("OTP_SERVICE_URL").unwrap_or(defaults.otp_url),
            gateway_url: std::env::var("PAYMENT_GATEWAY_URL").unwrap_or(defaults.gateway_url),
            request_timeout: std::env::var("SERVICE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        }
    }
}

impl Default for ServiceEndpoints {
    fn default() -> Self {
        Self {
            transaction_url: "http://localhost:8081".to_string(),
            folio_form_url: "http://localhost:8082".to_string(),
            otp_url: "http://localhost:8083".to_string(),
            gateway_url: "http://localhost:8084".to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

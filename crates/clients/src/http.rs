//! HTTP/JSON implementations of the four service clients.
//!
//! All four share one pooled `reqwest::Client` carrying the per-call
//! network timeout; a timed-out or failed transport surfaces as
//! `ServiceError::Unavailable`, which the orchestrator treats as
//! retryable.

use async_trait::async_trait;
use common::{AttemptId, UserId};
use domain::{
    ExistingFolio, FolioNumber, FolioReference, FolioResolution, InvestmentKind,
    InvestmentRequest, NewFolioTemplate, OtpChallenge, PaymentInitiation, PaymentMethod,
    PaymentStatus, SessionContext,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ServiceEndpoints;
use crate::error::ServiceError;
use crate::folio::FolioFormService;
use crate::gateway::PaymentGateway;
use crate::otp::OtpService;
use crate::transaction::{SubmitResponse, TransactionService};

/// Builds the shared HTTP client and the four service clients from the
/// configured endpoints.
pub fn build_clients(
    endpoints: &ServiceEndpoints,
) -> Result<
    (
        HttpTransactionService,
        HttpFolioFormService,
        HttpOtpService,
        HttpPaymentGateway,
    ),
    ServiceError,
> {
    let client = reqwest::Client::builder()
        .timeout(endpoints.request_timeout)
        .build()
        .map_err(|e| ServiceError::unavailable(format!("failed to build HTTP client: {e}")))?;

    Ok((
        HttpTransactionService {
            client: client.clone(),
            base_url: endpoints.transaction_url.clone(),
        },
        HttpFolioFormService {
            client: client.clone(),
            base_url: endpoints.folio_form_url.clone(),
        },
        HttpOtpService {
            client: client.clone(),
            base_url: endpoints.otp_url.clone(),
        },
        HttpPaymentGateway {
            client,
            base_url: endpoints.gateway_url.clone(),
        },
    ))
}

fn transport_error(e: reqwest::Error) -> ServiceError {
    ServiceError::unavailable(format!("request failed: {e}"))
}

#[derive(Debug, Deserialize)]
struct WireErrorBody {
    message: Option<String>,
    field: Option<String>,
}

/// Classifies a non-success response into the service error taxonomy.
async fn classify_failure(response: reqwest::Response) -> ServiceError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if status.is_server_error() {
        return ServiceError::unavailable(format!("status {status}"));
    }
    match serde_json::from_str::<WireErrorBody>(&body) {
        Ok(WireErrorBody {
            field: Some(field), ..
        }) => ServiceError::Invalid { field },
        Ok(WireErrorBody {
            message: Some(message),
            ..
        }) => ServiceError::rejected(message),
        _ => ServiceError::rejected(format!("status {status}")),
    }
}

/// Parses a success body, mapping deserialization failures to the fatal
/// malformed-response class.
async fn parse_success<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ServiceError> {
    let body = response.text().await.map_err(transport_error)?;
    serde_json::from_str(&body).map_err(|e| ServiceError::MalformedResponse(e.to_string()))
}

async fn post_json<B: Serialize, T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    body: &B,
) -> Result<T, ServiceError> {
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(transport_error)?;
    debug!(url, status = %response.status(), "service response received");
    if !response.status().is_success() {
        return Err(classify_failure(response).await);
    }
    parse_success(response).await
}

// Wire shapes. Request/response bodies are backend-owned; only the fields
// the orchestrator depends on are modeled here.

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireCustomer<'a> {
    tax_id: &'a str,
}

#[derive(Debug, Serialize)]
struct WireLumpsum {
    value: u64,
}

#[derive(Debug, Serialize)]
struct WireSip {
    value: u64,
    repeat: u32,
    date: u8,
    frequency: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireSubmitRequest<'a> {
    attempt_id: AttemptId,
    provider_id: &'a str,
    item_id: &'a str,
    fulfillment_id: &'a str,
    customer: WireCustomer<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lumpsum: Option<WireLumpsum>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sip: Option<WireSip>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireFolio {
    folio_number: String,
    holder_name: String,
    masked_email: String,
    masked_mobile: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireNewFolioForm {
    form_url: String,
    form_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSubmitResponse {
    #[serde(default)]
    folios: Vec<WireFolio>,
    new_folio_form: Option<WireNewFolioForm>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireMethodsRequest<'a> {
    attempt_id: AttemptId,
    #[serde(skip_serializing_if = "Option::is_none")]
    submission_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMethod {
    id: String,
    mode: String,
    /// Absent/null means the method cannot be authenticated and is
    /// filtered out before it ever reaches the data model.
    auth: Option<String>,
    mandate_limit: Option<u64>,
    collected_by: String,
    #[serde(rename = "type")]
    method_type: String,
}

#[derive(Debug, Deserialize)]
struct WireMethodsResponse {
    methods: Vec<WireMethod>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireResolveRequest<'a> {
    attempt_id: AttemptId,
    form_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResolveResponse {
    submission_id: String,
    transaction_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireOtpRequest {
    user_id: UserId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireOtpVerifyRequest<'a> {
    user_id: UserId,
    code: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireOtpChallenge {
    destination: String,
    expires_in: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireInitiateRequest<'a> {
    attempt_id: AttemptId,
    method_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    folio_number: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    submission_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireInitiateResponse {
    transaction_id: String,
    payment_url: String,
    order_id: String,
    payment_status: PaymentStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireStatusResponse {
    payment_status: PaymentStatus,
}

/// HTTP client for the transaction service.
#[derive(Debug, Clone)]
pub struct HttpTransactionService {
    client: reqwest::Client,
    base_url: String,
}

#[async_trait]
impl TransactionService for HttpTransactionService {
    async fn submit_selection(
        &self,
        attempt_id: AttemptId,
        _session: &SessionContext,
        request: &InvestmentRequest,
    ) -> Result<SubmitResponse, ServiceError> {
        let (lumpsum, sip) = match &request.kind {
            InvestmentKind::Lumpsum => (
                Some(WireLumpsum {
                    value: request.amount.units(),
                }),
                None,
            ),
            InvestmentKind::Sip(schedule) => (
                None,
                Some(WireSip {
                    value: request.amount.units(),
                    repeat: schedule.installment_count,
                    date: schedule.recurrence_day,
                    frequency: schedule.frequency.as_str(),
                }),
            ),
        };
        let body = WireSubmitRequest {
            attempt_id,
            provider_id: request.provider_id.as_str(),
            item_id: request.item_id.as_str(),
            fulfillment_id: request.fulfillment_id.as_str(),
            customer: WireCustomer {
                tax_id: request.customer_tax_id.as_str(),
            },
            lumpsum,
            sip,
        };

        let url = format!("{}/transactions", self.base_url);
        let wire: WireSubmitResponse = post_json(&self.client, &url, &body).await?;
        Ok(SubmitResponse {
            existing_folios: wire
                .folios
                .into_iter()
                .map(|f| ExistingFolio {
                    folio_number: FolioNumber::new(f.folio_number),
                    holder_name: f.holder_name,
                    masked_email: f.masked_email,
                    masked_mobile: f.masked_mobile,
                })
                .collect(),
            new_folio_template: wire.new_folio_form.map(|f| NewFolioTemplate {
                form_url: f.form_url,
                form_id: f.form_id,
            }),
        })
    }

    async fn list_payment_methods(
        &self,
        attempt_id: AttemptId,
        submission_id: Option<&str>,
    ) -> Result<Vec<PaymentMethod>, ServiceError> {
        let body = WireMethodsRequest {
            attempt_id,
            submission_id,
        };
        let url = format!("{}/payment-methods", self.base_url);
        let wire: WireMethodsResponse = post_json(&self.client, &url, &body).await?;
        Ok(offered_methods(wire.methods))
    }
}

/// Maps wire methods into the data model. Methods without an auth mode
/// cannot be authenticated and are dropped here, so they never surface.
fn offered_methods(methods: Vec<WireMethod>) -> Vec<PaymentMethod> {
    methods
        .into_iter()
        .filter_map(|m| {
            let auth_mode = m.auth?;
            Some(PaymentMethod {
                id: m.id,
                mode: m.mode,
                auth_mode,
                mandate_limit: m.mandate_limit.map(Into::into),
                collected_by: m.collected_by,
                method_type: m.method_type,
            })
        })
        .collect()
}

/// HTTP client for the folio-form service.
#[derive(Debug, Clone)]
pub struct HttpFolioFormService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFolioFormService {
    /// Form URLs are usually absolute; relative ones resolve against the
    /// configured base.
    fn resolve_url(&self, form_url: &str) -> String {
        if form_url.starts_with("http://") || form_url.starts_with("https://") {
            form_url.to_string()
        } else {
            format!("{}/{}", self.base_url, form_url.trim_start_matches('/'))
        }
    }
}

#[async_trait]
impl FolioFormService for HttpFolioFormService {
    async fn resolve_new_folio(
        &self,
        attempt_id: AttemptId,
        template: &NewFolioTemplate,
    ) -> Result<FolioResolution, ServiceError> {
        let body = WireResolveRequest {
            attempt_id,
            form_id: &template.form_id,
        };
        let url = self.resolve_url(&template.form_url);
        let wire: WireResolveResponse = post_json(&self.client, &url, &body).await?;
        Ok(FolioResolution {
            submission_id: wire.submission_id,
            external_transaction_id: wire.transaction_id,
        })
    }
}

/// HTTP client for the OTP service.
#[derive(Debug, Clone)]
pub struct HttpOtpService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOtpService {
    async fn challenge(&self, path: &str, user_id: UserId) -> Result<OtpChallenge, ServiceError> {
        let url = format!("{}{path}", self.base_url);
        let wire: WireOtpChallenge =
            post_json(&self.client, &url, &WireOtpRequest { user_id }).await?;
        Ok(OtpChallenge {
            destination_masked: wire.destination,
            expires_in_seconds: wire.expires_in,
            issued_at: chrono::Utc::now(),
        })
    }
}

#[async_trait]
impl OtpService for HttpOtpService {
    async fn send(&self, user_id: UserId) -> Result<OtpChallenge, ServiceError> {
        self.challenge("/otp/send", user_id).await
    }

    async fn verify(&self, user_id: UserId, code: &str) -> Result<(), ServiceError> {
        let url = format!("{}/otp/verify", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&WireOtpVerifyRequest { user_id, code })
            .send()
            .await
            .map_err(transport_error)?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(classify_failure(response).await)
        }
    }

    async fn resend(&self, user_id: UserId) -> Result<OtpChallenge, ServiceError> {
        self.challenge("/otp/resend", user_id).await
    }
}

/// HTTP client for the payment gateway.
#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn initiate(
        &self,
        attempt_id: AttemptId,
        method: &PaymentMethod,
        folio: &FolioReference,
    ) -> Result<PaymentInitiation, ServiceError> {
        let (folio_number, submission_id) = match folio {
            FolioReference::Existing(number) => (Some(number.as_str()), None),
            FolioReference::Resolved(resolution) => {
                (None, Some(resolution.submission_id.as_str()))
            }
        };
        let body = WireInitiateRequest {
            attempt_id,
            method_id: &method.id,
            folio_number,
            submission_id,
        };
        let url = format!("{}/payments", self.base_url);
        let wire: WireInitiateResponse = post_json(&self.client, &url, &body).await?;
        Ok(PaymentInitiation {
            gateway_transaction_id: wire.transaction_id,
            payment_url: wire.payment_url,
            order_id: wire.order_id,
            initial_status: wire.payment_status,
        })
    }

    async fn fetch_status(
        &self,
        gateway_transaction_id: &str,
    ) -> Result<PaymentStatus, ServiceError> {
        let url = format!(
            "{}/payments/{gateway_transaction_id}/status",
            self.base_url
        );
        let response = self.client.get(&url).send().await.map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(classify_failure(response).await);
        }
        let wire: WireStatusResponse = parse_success(response).await?;
        Ok(wire.payment_status)
    }
}

//! Request/response DTOs for the billing HTTP surface.

use serde::{Deserialize, Serialize};

use crate::application::handlers::{PlanChangeResult, PlanChangeStatus};
use crate::domain::billing::{BillingError, Subscription};

/// Body of `POST /billing/plan`.
#[derive(Debug, Deserialize)]
pub struct PlanChangeRequest {
    pub product_id: String,
}

/// Response of `POST /billing/plan`.
#[derive(Debug, Serialize)]
pub struct PlanChangeResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

impl From<PlanChangeResult> for PlanChangeResponse {
    fn from(result: PlanChangeResult) -> Self {
        let status = match result.status {
            PlanChangeStatus::Success => "success",
            PlanChangeStatus::RequiresAction => "requires_action",
            PlanChangeStatus::RequiresPaymentMethod => "requires_payment_method",
        };
        Self {
            status,
            client_secret: result.client_secret,
        }
    }
}

/// Body of `POST /billing/cancel`.
#[derive(Debug, Deserialize)]
pub struct CancellationRequest {
    pub cancel: bool,
}

/// Body of `POST /billing/verify`.
///
/// `session_id` is present when arriving from the checkout success
/// redirect; absent when re-verifying an existing subscription.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Body of `POST /billing/checkout`.
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub product_id: String,
    pub redirect_root_url: String,
}

/// Response of `POST /billing/checkout`.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub session_id: String,
}

/// Response of `GET /billing/portal`.
#[derive(Debug, Serialize)]
pub struct PortalResponse {
    pub url: String,
}

/// Client-facing view of a subscription row.
#[derive(Debug, Serialize)]
pub struct SubscriptionView {
    pub product_id: String,
    pub storage_quota: i64,
    pub payment_provider: String,
    pub is_cancelled: bool,
    pub expiry_time_micros: i64,
}

impl From<Subscription> for SubscriptionView {
    fn from(subscription: Subscription) -> Self {
        Self {
            product_id: subscription.product_id,
            storage_quota: subscription.storage_quota,
            payment_provider: format!("{:?}", subscription.payment_provider).to_lowercase(),
            is_cancelled: subscription.attributes.is_cancelled,
            expiry_time_micros: subscription.expiry_time.as_micros(),
        }
    }
}

/// Error body for every billing endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl From<&BillingError> for ErrorResponse {
    fn from(err: &BillingError) -> Self {
        Self {
            error: err.to_string(),
        }
    }
}

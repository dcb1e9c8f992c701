//! Wire types for the processor REST API.
//!
//! Only the fields the client reads are captured; everything else in the
//! processor's responses is ignored.

use serde::Deserialize;

use crate::domain::billing::RemoteSubscription;

/// Checkout session fetched with its subscription expanded.
#[derive(Debug, Deserialize)]
pub struct ExpandedCheckoutSession {
    pub subscription: Option<RemoteSubscription>,
}

/// Line-item listing of a checkout session.
#[derive(Debug, Deserialize)]
pub struct LineItemList {
    #[serde(default)]
    pub data: Vec<LineItem>,
}

#[derive(Debug, Deserialize)]
pub struct LineItem {
    pub price: LineItemPrice,
}

#[derive(Debug, Deserialize)]
pub struct LineItemPrice {
    pub id: String,
}

/// Subscription returned by an update call, with the latest invoice's
/// payment intent expanded.
#[derive(Debug, Deserialize)]
pub struct UpdatedSubscription {
    #[serde(default)]
    pub pending_update: Option<serde_json::Value>,
    #[serde(default)]
    pub latest_invoice: Option<ExpandedInvoice>,
}

#[derive(Debug, Deserialize)]
pub struct ExpandedInvoice {
    pub id: String,
    #[serde(default)]
    pub payment_intent: Option<PaymentIntent>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentIntent {
    pub status: String,
    #[serde(default)]
    pub client_secret: Option<String>,
}

/// Session creation response.
#[derive(Debug, Deserialize)]
pub struct CreatedSession {
    pub id: String,
}

/// Portal session creation response.
#[derive(Debug, Deserialize)]
pub struct CreatedPortalSession {
    pub url: String,
}

/// Error body the processor returns on non-2xx responses.
#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error: ApiErrorDetail,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

//! Processor webhook event model.
//!
//! Inbound events are typed into a closed set of variants with a total-match
//! dispatch downstream; unrecognized types stay a distinct `Unknown` variant
//! rather than an error. Only fields this service acts on are captured.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::errors::WebhookError;

/// Metadata key the processor carries to suppress end-of-subscription
/// notifications (set during account deletion and re-subscription flows).
pub const SKIP_NOTIFICATION_KEY: &str = "skip_notification";

/// A verified, parsed webhook event.
#[derive(Debug, Clone)]
pub struct ProcessorEvent {
    /// Processor event id (evt_xxx).
    pub id: String,

    /// Raw event type string as reported by the processor.
    pub event_type: String,

    /// Event creation time (Unix seconds).
    pub created: i64,

    /// Typed payload.
    pub kind: ProcessorEventKind,

    /// Full event body, kept for the audit log.
    pub raw: serde_json::Value,
}

/// Closed set of event types this service acts on.
#[derive(Debug, Clone)]
pub enum ProcessorEventKind {
    CheckoutCompleted(CheckoutSessionObject),
    SubscriptionDeleted(RemoteSubscription),
    SubscriptionUpdated(RemoteSubscription),
    InvoicePaid(RemoteInvoice),
    /// Delivered but intentionally not acted on; always acknowledged.
    Unknown,
}

#[derive(Debug, Deserialize)]
struct EventEnvelope {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    created: i64,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: serde_json::Value,
}

impl ProcessorEvent {
    /// Parses a verified payload into a typed event.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::Parse` when the envelope or the payload for a
    /// recognized type is malformed. Unrecognized types parse successfully
    /// into `ProcessorEventKind::Unknown`.
    pub fn parse(payload: &[u8]) -> Result<Self, WebhookError> {
        let raw: serde_json::Value = serde_json::from_slice(payload)
            .map_err(|e| WebhookError::Parse(e.to_string()))?;
        let envelope: EventEnvelope = serde_json::from_value(raw.clone())
            .map_err(|e| WebhookError::Parse(e.to_string()))?;

        let object = envelope.data.object;
        let kind = match envelope.event_type.as_str() {
            "checkout.session.completed" => {
                ProcessorEventKind::CheckoutCompleted(parse_object(object)?)
            }
            "customer.subscription.deleted" => {
                ProcessorEventKind::SubscriptionDeleted(parse_object(object)?)
            }
            "customer.subscription.updated" => {
                ProcessorEventKind::SubscriptionUpdated(parse_object(object)?)
            }
            "invoice.paid" => ProcessorEventKind::InvoicePaid(parse_object(object)?),
            _ => ProcessorEventKind::Unknown,
        };

        Ok(Self {
            id: envelope.id,
            event_type: envelope.event_type,
            created: envelope.created,
            kind,
            raw,
        })
    }
}

fn parse_object<T: serde::de::DeserializeOwned>(
    object: serde_json::Value,
) -> Result<T, WebhookError> {
    serde_json::from_value(object).map_err(|e| WebhookError::Parse(e.to_string()))
}

/// Checkout session as reported in `checkout.session.completed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: String,

    /// User id inserted at session creation for direct purchases; absent for
    /// offer-redemption sessions keyed by email.
    #[serde(default)]
    pub client_reference_id: Option<String>,

    #[serde(default)]
    pub customer: Option<String>,

    #[serde(default)]
    customer_details: Option<CustomerDetails>,

    #[serde(default)]
    pub currency: Option<String>,

    /// Total charged, in the currency's minor unit.
    #[serde(default)]
    pub amount_total: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CustomerDetails {
    #[serde(default)]
    email: Option<String>,
}

impl CheckoutSessionObject {
    /// Purchaser email, when the processor attached customer details.
    pub fn customer_email(&self) -> Option<&str> {
        self.customer_details
            .as_ref()
            .and_then(|d| d.email.as_deref())
    }
}

/// Processor subscription status values this service distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteSubscriptionStatus {
    Active,
    PastDue,
    Canceled,
    #[serde(other)]
    Other,
}

/// Normalized view of a processor-side subscription.
///
/// Shared between webhook payloads and processor API responses so no caller
/// handles two shapes of the same object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSubscription {
    /// Processor subscription id; the ledger's `original_transaction_id`.
    pub id: String,

    #[serde(rename = "customer")]
    pub customer_id: String,

    pub status: RemoteSubscriptionStatus,

    #[serde(default)]
    pub cancel_at_period_end: bool,

    /// End of the current paid period (Unix seconds).
    pub current_period_end: i64,

    #[serde(default)]
    pub metadata: HashMap<String, String>,

    #[serde(default)]
    items: SubscriptionItems,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SubscriptionItems {
    #[serde(default)]
    data: Vec<SubscriptionItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SubscriptionItem {
    id: String,
    price: ItemPrice,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ItemPrice {
    id: String,
}

impl RemoteSubscription {
    /// Price id of the first subscription item; the product the ledger
    /// tracks.
    pub fn price_id(&self) -> Option<&str> {
        self.items.data.first().map(|i| i.price.id.as_str())
    }

    /// Item id of the first subscription item; the handle used for price
    /// updates.
    pub fn item_id(&self) -> Option<&str> {
        self.items.data.first().map(|i| i.id.as_str())
    }

    /// Whether the skip-notification tag is present.
    pub fn skip_notification(&self) -> bool {
        self.metadata
            .get(SKIP_NOTIFICATION_KEY)
            .map(|v| v == "true")
            .unwrap_or(false)
    }
}

/// Invoice as reported in `invoice.paid`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteInvoice {
    pub id: String,

    /// Subscription the invoice renews; absent for one-off invoices.
    #[serde(rename = "subscription", default)]
    pub subscription_id: Option<String>,
}

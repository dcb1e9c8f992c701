//! ProcessorClient port - contract with the external payment processor.
//!
//! One client per regional processor account. Implementations normalize
//! every failure into `ProcessorError` with an `ErrorClass`, so callers
//! never inspect transport-specific error shapes.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::billing::{BillingError, ProcessorError, Region, RemoteSubscription};
use crate::domain::foundation::UserId;

/// Parameters for creating a checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    /// Price id being purchased.
    pub price_id: String,

    /// User id embedded as the session's client reference for direct
    /// purchases; `None` for anonymous/offer sessions.
    pub client_reference: Option<UserId>,

    /// Existing processor customer to attach the purchase to.
    pub customer_id: Option<String>,

    /// Email pre-fill when no processor customer exists yet.
    pub customer_email: Option<String>,

    pub success_url: String,
    pub cancel_url: String,
}

/// Payment state of a pending subscription update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingPaymentState {
    /// Further authentication needed; client secret completes it.
    RequiresAction,
    /// The payment method was rejected; a different one is needed.
    RequiresPaymentMethod,
    /// Any other in-flight state.
    Other,
}

/// A subscription update left pending by the processor.
#[derive(Debug, Clone)]
pub struct PendingUpdate {
    pub payment_state: PendingPaymentState,
    /// Invoice awaiting resolution.
    pub invoice_id: String,
    /// Secret the client needs to complete authentication.
    pub client_secret: Option<String>,
}

/// Outcome of a subscription price update.
#[derive(Debug, Clone, Default)]
pub struct PriceUpdate {
    /// `None` when the update settled immediately.
    pub pending: Option<PendingUpdate>,
}

/// Port for one regional processor account.
#[async_trait]
pub trait ProcessorClient: Send + Sync {
    /// Fetch a subscription by its processor id.
    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<RemoteSubscription, ProcessorError>;

    /// Fetch the subscription attached to a checkout session.
    async fn subscription_for_session(
        &self,
        session_id: &str,
    ) -> Result<RemoteSubscription, ProcessorError>;

    /// Price id of the first line item of a checkout session.
    async fn first_price_of_session(&self, session_id: &str) -> Result<String, ProcessorError>;

    /// Move the subscription's item to a new price, invoicing the proration
    /// immediately and leaving incomplete payments pending.
    async fn update_price(
        &self,
        subscription_id: &str,
        item_id: &str,
        price_id: &str,
    ) -> Result<PriceUpdate, ProcessorError>;

    /// Set or clear the cancel-at-period-end flag.
    async fn set_cancel_at_period_end(
        &self,
        subscription_id: &str,
        cancel: bool,
    ) -> Result<(), ProcessorError>;

    /// Tag the subscription so its eventual deletion event does not trigger
    /// an end-of-subscription notification.
    async fn tag_skip_notification(&self, subscription_id: &str) -> Result<(), ProcessorError>;

    /// Cancel immediately, optionally crediting the unused period.
    async fn cancel_now(&self, subscription_id: &str, prorate: bool)
        -> Result<(), ProcessorError>;

    /// Delete the customer record.
    async fn delete_customer(&self, customer_id: &str) -> Result<(), ProcessorError>;

    /// Create a checkout session; returns the session id.
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<String, ProcessorError>;

    /// Create a billing-portal session; returns the redirect URL.
    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<String, ProcessorError>;

    /// Void an open invoice.
    async fn void_invoice(&self, invoice_id: &str) -> Result<(), ProcessorError>;

    /// Propagate an account email change to the customer record.
    async fn update_customer_email(
        &self,
        customer_id: &str,
        email: &str,
    ) -> Result<(), ProcessorError>;
}

/// Registry construction and lookup failures.
///
/// These are configuration errors, not runtime data errors, and fail
/// loudly.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no processor client configured for region {0}")]
    Unconfigured(Region),

    #[error("default region {0} has no configured client")]
    MissingDefault(Region),
}

impl From<RegistryError> for BillingError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Unconfigured(region) | RegistryError::MissingDefault(region) => {
                BillingError::UnconfiguredRegion(region)
            }
        }
    }
}

/// Immutable region-to-client map, built once at startup and injected into
/// every component that talks to the processor.
pub struct ClientRegistry {
    clients: BTreeMap<Region, Arc<dyn ProcessorClient>>,
    default_region: Region,
}

impl ClientRegistry {
    /// Builds the registry; the default region must have a client.
    pub fn new(
        clients: BTreeMap<Region, Arc<dyn ProcessorClient>>,
        default_region: Region,
    ) -> Result<Self, RegistryError> {
        if !clients.contains_key(&default_region) {
            return Err(RegistryError::MissingDefault(default_region));
        }
        Ok(Self {
            clients,
            default_region,
        })
    }

    /// Client for a region; missing configuration is a loud error.
    pub fn client_for(&self, region: Region) -> Result<&Arc<dyn ProcessorClient>, RegistryError> {
        self.clients
            .get(&region)
            .ok_or(RegistryError::Unconfigured(region))
    }

    /// Client used for flows with no existing regional affinity.
    pub fn default_client(&self) -> &Arc<dyn ProcessorClient> {
        &self.clients[&self.default_region]
    }

    /// Region of the default client.
    pub fn default_region(&self) -> Region {
        self.default_region
    }

    /// Configured regions, in canonical order.
    pub fn regions(&self) -> impl Iterator<Item = Region> + '_ {
        self.clients.keys().copied()
    }
}

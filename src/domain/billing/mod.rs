//! Billing domain module.
//!
//! The subscription ledger and everything that mutates it: the webhook
//! dispatcher and reconciler, the plan catalog, signature verification,
//! downgrade checking, and the notification intents transitions emit.
//!
//! # Module Structure
//!
//! - `plan` - Region, BillingPlan, PlanCatalog
//! - `subscription` - the per-user ledger row and its derived lifecycle
//! - `event` - typed processor webhook events
//! - `signature` - webhook signature verification
//! - `reconciler` - idempotent, out-of-order-safe state transitions
//! - `dispatcher` - verification, routing, audit logging
//! - `downgrade` - downgrade eligibility against consumed usage
//! - `notification` - intents consumed by the async notification worker
//! - `errors` - the billing error taxonomy

mod dispatcher;
mod downgrade;
mod errors;
mod event;
mod notification;
mod plan;
mod reconciler;
mod signature;
mod subscription;

pub use dispatcher::{DispatchOutcome, WebhookDispatcher};
pub use downgrade::DowngradeChecker;
pub use errors::{BillingError, ErrorClass, ProcessorError, WebhookError};
pub use event::{
    CheckoutSessionObject, ProcessorEvent, ProcessorEventKind, RemoteInvoice, RemoteSubscription,
    RemoteSubscriptionStatus, SKIP_NOTIFICATION_KEY,
};
pub use notification::{format_amount, NotificationIntent};
pub use plan::{BillingPlan, CatalogError, PlanCatalog, Region, DEFAULT_CATALOG};
pub use reconciler::{HandlerLog, SubscriptionReconciler};
pub use signature::{SignatureHeader, WebhookVerifier};
pub use subscription::{
    PaymentProvider, Subscription, SubscriptionAttributes, SubscriptionState,
    FREE_PLAN_PRODUCT_ID, FREE_PLAN_STORAGE,
};

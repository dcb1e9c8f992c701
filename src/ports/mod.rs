//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the billing domain and the outside world. Adapters implement these
//! ports.
//!
//! - `SubscriptionStore` - the one-subscription-per-user ledger + event log
//! - `ProcessorClient` / `ClientRegistry` - regional payment processor API
//! - `StorageUsage` - consumed and bonus storage figures
//! - `UserDirectory` - minimal account lookups
//! - `OfferApplier` - anonymous-offer redemption
//! - `NotificationQueue` / `NotificationSink` - async side-channel alerts

mod notifier;
mod offers;
mod processor_client;
mod subscription_store;
mod usage;
mod users;

pub use notifier::{NotificationQueue, NotificationSink, SinkError};
pub use offers::OfferApplier;
pub use processor_client::{
    CheckoutSessionRequest, ClientRegistry, PendingPaymentState, PendingUpdate, PriceUpdate,
    ProcessorClient, RegistryError,
};
pub use subscription_store::{EventLogEntry, StoreError, SubscriptionStore};
pub use usage::StorageUsage;
pub use users::{UserAccount, UserDirectory};

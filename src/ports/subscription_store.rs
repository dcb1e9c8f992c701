//! SubscriptionStore port - the ledger persistence contract.
//!
//! The reconciler depends only on this surface; each operation must be
//! atomic per row. Concurrency safety comes from the staleness check the
//! reconciler performs against the value read immediately before each
//! write, not from in-process locking: duplicate application is defined to
//! be a safe no-op.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::billing::{BillingError, PaymentProvider, Subscription};
use crate::domain::foundation::{Timestamp, UserId};

/// Append-only audit record for a handled webhook event.
///
/// Entries are keyed loosely by user; the dispatcher drops entries with no
/// resolvable user before they reach this type.
#[derive(Debug, Clone)]
pub struct EventLogEntry {
    pub id: Uuid,
    pub user_id: UserId,
    /// Raw webhook event body.
    pub event: serde_json::Value,
    /// Processor subscription snapshot at handling time.
    pub snapshot: serde_json::Value,
    pub recorded_at: Timestamp,
}

impl EventLogEntry {
    pub fn new(user_id: UserId, event: serde_json::Value, snapshot: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            event,
            snapshot,
            recorded_at: Timestamp::now(),
        }
    }
}

/// Ledger storage failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No row for the requested key.
    #[error("subscription not found")]
    NotFound,

    /// Backend failure.
    #[error("storage failure: {0}")]
    Backend(String),
}

impl From<StoreError> for BillingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => BillingError::NotFound("subscription"),
            StoreError::Backend(msg) => BillingError::Store(msg),
        }
    }
}

/// Port for the one-subscription-per-user ledger and its event log.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Fetch the user's subscription row.
    ///
    /// Every provisioned user has at least a free row, so `NotFound` here
    /// means the user does not exist.
    async fn get_by_user(&self, user_id: UserId) -> Result<Subscription, StoreError>;

    /// Exact lookup by processor subscription id within a provider.
    ///
    /// Returns `None` when no row references the transaction - the signal
    /// for out-of-order webhook delivery.
    async fn get_by_transaction(
        &self,
        transaction_id: &str,
        provider: PaymentProvider,
    ) -> Result<Option<Subscription>, StoreError>;

    /// Atomically replace the user's row with a new subscription.
    async fn replace(&self, user_id: UserId, subscription: Subscription)
        -> Result<(), StoreError>;

    /// Persist a new expiry only; no other field changes.
    async fn update_expiry(&self, user_id: UserId, expiry: Timestamp) -> Result<(), StoreError>;

    /// Persist the cancel-at-period-end flag.
    async fn update_cancellation(&self, user_id: UserId, cancelled: bool)
        -> Result<(), StoreError>;

    /// Append an audit entry to the event log.
    async fn append_event_log(&self, entry: EventLogEntry) -> Result<(), StoreError>;
}

//! In-memory subscription store.
//!
//! Backs unit and integration tests, and local development wiring. Row
//! operations take the write lock for their whole duration, giving the
//! per-row atomicity the port requires.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::billing::{PaymentProvider, Subscription};
use crate::domain::foundation::{Timestamp, UserId};
use crate::ports::{EventLogEntry, StoreError, SubscriptionStore};

/// HashMap-backed ledger with an append-only event log.
#[derive(Default)]
pub struct InMemorySubscriptionStore {
    rows: Arc<RwLock<HashMap<UserId, Subscription>>>,
    event_log: Arc<RwLock<Vec<EventLogEntry>>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provision a user with the synthetic free row.
    pub async fn seed_user(&self, user_id: UserId) {
        self.rows
            .write()
            .await
            .insert(user_id, Subscription::free(user_id));
    }

    /// Insert or overwrite a row directly (test setup).
    pub async fn put(&self, subscription: Subscription) {
        self.rows
            .write()
            .await
            .insert(subscription.user_id, subscription);
    }

    /// Snapshot of the event log (test assertions).
    pub async fn event_log(&self) -> Vec<EventLogEntry> {
        self.event_log.read().await.clone()
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn get_by_user(&self, user_id: UserId) -> Result<Subscription, StoreError> {
        self.rows
            .read()
            .await
            .get(&user_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_transaction(
        &self,
        transaction_id: &str,
        provider: PaymentProvider,
    ) -> Result<Option<Subscription>, StoreError> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .find(|s| {
                s.payment_provider == provider && s.original_transaction_id == transaction_id
            })
            .cloned())
    }

    async fn replace(
        &self,
        user_id: UserId,
        subscription: Subscription,
    ) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        if !rows.contains_key(&user_id) {
            return Err(StoreError::NotFound);
        }
        rows.insert(user_id, subscription);
        Ok(())
    }

    async fn update_expiry(&self, user_id: UserId, expiry: Timestamp) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        let row = rows.get_mut(&user_id).ok_or(StoreError::NotFound)?;
        row.expiry_time = expiry;
        Ok(())
    }

    async fn update_cancellation(
        &self,
        user_id: UserId,
        cancelled: bool,
    ) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        let row = rows.get_mut(&user_id).ok_or(StoreError::NotFound)?;
        row.attributes.is_cancelled = cancelled;
        Ok(())
    }

    async fn append_event_log(&self, entry: EventLogEntry) -> Result<(), StoreError> {
        self.event_log.write().await.push(entry);
        Ok(())
    }
}

//! In-memory user directory, storage usage, and offer applier.
//!
//! Programmable collaborator stand-ins for tests and local wiring.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::billing::BillingError;
use crate::domain::foundation::UserId;
use crate::ports::{OfferApplier, StorageUsage, UserAccount, UserDirectory};

/// HashMap-backed user directory; absent users read as removed.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    accounts: Mutex<HashMap<UserId, UserAccount>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, account: UserAccount) {
        self.accounts
            .lock()
            .expect("directory lock poisoned")
            .insert(account.user_id, account);
    }

    /// Mark a user as removed from the system.
    pub fn remove(&self, user_id: UserId) {
        self.accounts
            .lock()
            .expect("directory lock poisoned")
            .remove(&user_id);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find(&self, user_id: UserId) -> Result<Option<UserAccount>, BillingError> {
        Ok(self
            .accounts
            .lock()
            .expect("directory lock poisoned")
            .get(&user_id)
            .cloned())
    }
}

/// Programmable storage figures.
#[derive(Default)]
pub struct InMemoryStorageUsage {
    consumed: Mutex<HashMap<UserId, i64>>,
    surplus: Mutex<HashMap<UserId, i64>>,
}

impl InMemoryStorageUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_consumed(&self, user_id: UserId, bytes: i64) {
        self.consumed
            .lock()
            .expect("usage lock poisoned")
            .insert(user_id, bytes);
    }

    pub fn set_surplus(&self, user_id: UserId, bytes: i64) {
        self.surplus
            .lock()
            .expect("usage lock poisoned")
            .insert(user_id, bytes);
    }
}

#[async_trait]
impl StorageUsage for InMemoryStorageUsage {
    async fn consumed_bytes(&self, user_id: UserId) -> Result<i64, BillingError> {
        Ok(self
            .consumed
            .lock()
            .expect("usage lock poisoned")
            .get(&user_id)
            .copied()
            .unwrap_or(0))
    }

    async fn surplus_bonus_bytes(&self, user_id: UserId) -> Result<Option<i64>, BillingError> {
        Ok(self
            .surplus
            .lock()
            .expect("usage lock poisoned")
            .get(&user_id)
            .copied())
    }
}

/// Records every applied offer for assertions.
#[derive(Default)]
pub struct RecordingOfferApplier {
    applied: Mutex<Vec<(String, String)>>,
}

impl RecordingOfferApplier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn applied(&self) -> Vec<(String, String)> {
        self.applied.lock().expect("offers lock poisoned").clone()
    }
}

#[async_trait]
impl OfferApplier for RecordingOfferApplier {
    async fn apply_offer(&self, email: &str, price_id: &str) -> Result<(), BillingError> {
        self.applied
            .lock()
            .expect("offers lock poisoned")
            .push((email.to_string(), price_id.to_string()));
        Ok(())
    }
}

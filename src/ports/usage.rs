//! StorageUsage port - consumed-storage and bonus-storage lookups.
//!
//! Usage accounting lives in a separate service; billing only asks two
//! questions of it.

use async_trait::async_trait;

use crate::domain::billing::BillingError;
use crate::domain::foundation::UserId;

/// Port for externally computed storage figures.
#[async_trait]
pub trait StorageUsage: Send + Sync {
    /// Bytes the user currently consumes across all files.
    async fn consumed_bytes(&self, user_id: UserId) -> Result<i64, BillingError>;

    /// Surplus paid-addon bonus storage, if the user holds any.
    ///
    /// A positive surplus suppresses the end-of-subscription notification:
    /// the account remains functional on bonus storage alone.
    async fn surplus_bonus_bytes(&self, user_id: UserId) -> Result<Option<i64>, BillingError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_usage_is_object_safe() {
        fn _accepts_dyn(_usage: &dyn StorageUsage) {}
    }
}

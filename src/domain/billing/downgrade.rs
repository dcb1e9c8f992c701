//! Downgrade eligibility.
//!
//! A storage-reducing plan change is only safe when the user's consumed
//! storage already fits the target quota. Exceeding it is a legitimate
//! business rejection, not an error; the caller surfaces it as
//! `CannotDowngrade`.

use std::sync::Arc;

use crate::domain::foundation::UserId;
use crate::ports::StorageUsage;

use super::errors::BillingError;

/// Checks whether a quota reduction is safe for a user.
pub struct DowngradeChecker {
    usage: Arc<dyn StorageUsage>,
}

impl DowngradeChecker {
    pub fn new(usage: Arc<dyn StorageUsage>) -> Self {
        Self { usage }
    }

    /// `Ok(false)` when current usage exceeds the target quota.
    pub async fn can_downgrade(
        &self,
        target_quota: i64,
        user_id: UserId,
    ) -> Result<bool, BillingError> {
        let consumed = self.usage.consumed_bytes(user_id).await?;
        Ok(consumed <= target_quota)
    }
}

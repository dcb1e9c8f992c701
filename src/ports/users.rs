//! UserDirectory port - the slice of account data billing needs.

use async_trait::async_trait;

use crate::domain::billing::BillingError;
use crate::domain::foundation::UserId;

/// Account details relevant to billing flows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    pub user_id: UserId,
    pub email: String,
    /// Admin of the shared plan this user belongs to, if any.
    pub plan_admin_id: Option<UserId>,
}

impl UserAccount {
    /// Whether the user is a dependent member of someone else's shared
    /// plan. Plan-lifecycle notifications go to owners only.
    pub fn is_dependent_member(&self) -> bool {
        self.plan_admin_id
            .map(|admin| admin != self.user_id)
            .unwrap_or(false)
    }
}

/// Port for resolving user accounts.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look up an account; `None` means the user was removed from the
    /// system (webhooks for removed users no-op).
    async fn find(&self, user_id: UserId) -> Result<Option<UserAccount>, BillingError>;
}

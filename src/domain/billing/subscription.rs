//! Subscription ledger row.
//!
//! Each user holds exactly one subscription row at any time. Users who never
//! purchased hold a synthetic free row; rows are never deleted, only
//! transitioned. All mutation goes through the reconciler or the
//! user-initiated command handlers.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Timestamp, UserId};

use super::plan::Region;

/// Product id of the synthetic free plan.
pub const FREE_PLAN_PRODUCT_ID: &str = "free";

/// Storage granted to accounts without a purchase, in bytes (5 GiB).
pub const FREE_PLAN_STORAGE: i64 = 5 * 1024 * 1024 * 1024;

/// Grace window after expiry during which a row reads as past-due rather
/// than lapsed.
const PAST_DUE_GRACE_DAYS: i64 = 30;

/// Payment service of record for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentProvider {
    /// No purchase; the synthetic free row.
    Free,
    /// The Stripe-style regional processor this service reconciles against.
    Stripe,
    /// Mobile storefront purchases, reconciled elsewhere.
    AppStore,
}

/// Provider-side attributes attached to a ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionAttributes {
    /// Processor customer id; empty for free rows.
    pub customer_id: String,

    /// Whether the subscription is set to end at the period boundary.
    pub is_cancelled: bool,

    /// Processor account region holding the customer; `None` off-processor.
    pub account_region: Option<Region>,
}

/// Conceptual lifecycle state, derived on read and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Free,
    ActivePaid,
    /// Active but flagged to cancel at period end.
    PendingCancellation,
    /// Expired within the grace window.
    PastDue,
    Lapsed,
}

/// The single persisted subscription record for a user.
///
/// # Invariants
///
/// - Exactly one row per user; a user with no purchase has a free row.
/// - `expiry_time` for a given `original_transaction_id` never moves
///   backward under replay; the reconciler enforces this on every write.
/// - `original_transaction_id` is unique within a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Owning user; immutable.
    pub user_id: UserId,

    /// Payment service of record.
    pub payment_provider: PaymentProvider,

    /// Processor product/price id the row was purchased under.
    pub product_id: String,

    /// Storage quota in bytes, resolved from the plan catalog at apply time.
    pub storage_quota: i64,

    /// Provider-side attributes.
    pub attributes: SubscriptionAttributes,

    /// Processor subscription id; empty for free rows.
    pub original_transaction_id: String,

    /// End of the paid period; epoch for free rows.
    pub expiry_time: Timestamp,
}

impl Subscription {
    /// The synthetic row created at user signup.
    pub fn free(user_id: UserId) -> Self {
        Self {
            user_id,
            payment_provider: PaymentProvider::Free,
            product_id: FREE_PLAN_PRODUCT_ID.to_string(),
            storage_quota: FREE_PLAN_STORAGE,
            attributes: SubscriptionAttributes {
                customer_id: String::new(),
                is_cancelled: false,
                account_region: None,
            },
            original_transaction_id: String::new(),
            expiry_time: Timestamp::epoch(),
        }
    }

    /// Whether the row represents a paid plan still within its period.
    pub fn is_active_paid(&self, now: Timestamp) -> bool {
        self.payment_provider != PaymentProvider::Free && self.expiry_time.is_after(&now)
    }

    /// Whether the row still carries the free plan.
    pub fn is_free_plan(&self) -> bool {
        self.product_id == FREE_PLAN_PRODUCT_ID
    }

    /// Whether a switch to a different payment provider is legal.
    ///
    /// Switching requires the current subscription to be cancelled or
    /// already expired; a live paid subscription pins its provider.
    pub fn can_switch_provider(&self, now: Timestamp) -> bool {
        !self.is_active_paid(now) || self.attributes.is_cancelled
    }

    /// Derives the lifecycle state from the stored fields.
    pub fn state(&self, now: Timestamp) -> SubscriptionState {
        if self.payment_provider == PaymentProvider::Free {
            return SubscriptionState::Free;
        }
        if self.expiry_time.is_after(&now) {
            if self.attributes.is_cancelled {
                SubscriptionState::PendingCancellation
            } else {
                SubscriptionState::ActivePaid
            }
        } else if self.expiry_time.add_days(PAST_DUE_GRACE_DAYS).is_after(&now) {
            SubscriptionState::PastDue
        } else {
            SubscriptionState::Lapsed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paid_row(expiry: Timestamp, cancelled: bool) -> Subscription {
        Subscription {
            user_id: UserId::new(1),
            payment_provider: PaymentProvider::Stripe,
            product_id: "price_eu_50gb_monthly".to_string(),
            storage_quota: 50,
            attributes: SubscriptionAttributes {
                customer_id: "cus_1".to_string(),
                is_cancelled: cancelled,
                account_region: Some(Region::Eu),
            },
            original_transaction_id: "sub_1".to_string(),
            expiry_time: expiry,
        }
    }

    // ══════════════════════════════════════════════════════════════
    // Free Row Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn free_row_carries_free_plan_and_epoch_expiry() {
        let row = Subscription::free(UserId::new(9));

        assert_eq!(row.payment_provider, PaymentProvider::Free);
        assert!(row.is_free_plan());
        assert_eq!(row.expiry_time, Timestamp::epoch());
        assert_eq!(row.storage_quota, FREE_PLAN_STORAGE);
        assert!(row.attributes.account_region.is_none());
    }

    #[test]
    fn free_row_is_never_active_paid() {
        let row = Subscription::free(UserId::new(9));
        assert!(!row.is_active_paid(Timestamp::now()));
        assert_eq!(row.state(Timestamp::now()), SubscriptionState::Free);
    }

    // ══════════════════════════════════════════════════════════════
    // Derived State Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn live_uncancelled_row_is_active_paid() {
        let now = Timestamp::now();
        let row = paid_row(now.add_days(10), false);
        assert_eq!(row.state(now), SubscriptionState::ActivePaid);
        assert!(row.is_active_paid(now));
    }

    #[test]
    fn live_cancelled_row_is_pending_cancellation() {
        let now = Timestamp::now();
        let row = paid_row(now.add_days(10), true);
        assert_eq!(row.state(now), SubscriptionState::PendingCancellation);
    }

    #[test]
    fn recently_expired_row_is_past_due() {
        let now = Timestamp::now();
        let row = paid_row(now.add_days(-5), false);
        assert_eq!(row.state(now), SubscriptionState::PastDue);
    }

    #[test]
    fn long_expired_row_is_lapsed() {
        let now = Timestamp::now();
        let row = paid_row(now.add_days(-60), false);
        assert_eq!(row.state(now), SubscriptionState::Lapsed);
    }

    // ══════════════════════════════════════════════════════════════
    // Provider Switch Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn live_subscription_pins_its_provider() {
        let now = Timestamp::now();
        assert!(!paid_row(now.add_days(10), false).can_switch_provider(now));
    }

    #[test]
    fn cancelled_or_expired_subscription_allows_switch() {
        let now = Timestamp::now();
        assert!(paid_row(now.add_days(10), true).can_switch_provider(now));
        assert!(paid_row(now.add_days(-10), false).can_switch_provider(now));
    }
}

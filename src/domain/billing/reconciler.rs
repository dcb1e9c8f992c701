//! Subscription reconciler.
//!
//! Applies processor-reported state to the ledger. Webhooks arrive late,
//! duplicated, or before the row they reference exists; every handler is
//! idempotent under replay and the ledger converges to the processor's true
//! state without regressing.
//!
//! Staleness rule, used throughout: an incoming state that is not strictly
//! newer than the stored state was already applied. Stale events return
//! success with no mutation - they are an outcome, not an error. This is
//! the single idempotency mechanism; there are no sequence numbers and no
//! locks, because duplicate application is a safe no-op by construction.

use std::sync::Arc;

use crate::domain::foundation::{Timestamp, UserId};
use crate::ports::{
    ClientRegistry, NotificationQueue, OfferApplier, ProcessorClient, StorageUsage,
    SubscriptionStore, UserDirectory,
};

use super::errors::BillingError;
use super::event::{CheckoutSessionObject, RemoteInvoice, RemoteSubscription,
    RemoteSubscriptionStatus};
use super::notification::{format_amount, NotificationIntent};
use super::plan::PlanCatalog;
use super::subscription::{PaymentProvider, Subscription, SubscriptionAttributes};

/// What a transition handler hands back to the dispatcher for auditing.
///
/// `user_id` is `None` for events with no resolvable owner: out-of-order
/// deliveries preceding provisioning, and anonymous offer flows whose audit
/// trail lives with the offer service. Those entries are dropped, not
/// logged.
#[derive(Debug, Clone)]
pub struct HandlerLog {
    pub user_id: Option<UserId>,
    pub snapshot: serde_json::Value,
}

impl HandlerLog {
    fn for_user(user_id: UserId, snapshot: serde_json::Value) -> Self {
        Self {
            user_id: Some(user_id),
            snapshot,
        }
    }

    fn anonymous() -> Self {
        Self {
            user_id: None,
            snapshot: serde_json::Value::Null,
        }
    }
}

/// Applies processor events to the subscription ledger.
pub struct SubscriptionReconciler {
    store: Arc<dyn SubscriptionStore>,
    registry: Arc<ClientRegistry>,
    catalog: Arc<PlanCatalog>,
    users: Arc<dyn UserDirectory>,
    usage: Arc<dyn StorageUsage>,
    offers: Arc<dyn OfferApplier>,
    notifier: Arc<dyn NotificationQueue>,
}

impl SubscriptionReconciler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        registry: Arc<ClientRegistry>,
        catalog: Arc<PlanCatalog>,
        users: Arc<dyn UserDirectory>,
        usage: Arc<dyn StorageUsage>,
        offers: Arc<dyn OfferApplier>,
        notifier: Arc<dyn NotificationQueue>,
    ) -> Self {
        Self {
            store,
            registry,
            catalog,
            users,
            usage,
            offers,
            notifier,
        }
    }

    /// Payment succeeded and the processor created the subscription;
    /// provision it.
    pub async fn checkout_completed(
        &self,
        session: &CheckoutSessionObject,
    ) -> Result<HandlerLog, BillingError> {
        let Some(reference) = session.client_reference_id.as_deref() else {
            // Offer-redemption flow keyed by email; no ledger row is
            // touched and the offer service owns the audit trail.
            return self.apply_session_offer(session).await;
        };

        let user_id: UserId = reference.parse().map_err(|_| BillingError::BadRequest)?;
        let current = self.store.get_by_user(user_id).await?;
        let client = self.client_for_row(&current)?;

        let remote = client.subscription_for_session(&session.id).await?;
        if remote.status != RemoteSubscriptionStatus::Active {
            return Err(BillingError::BadRequest);
        }
        let candidate = self.subscription_from_remote(user_id, &remote)?;
        let snapshot = snapshot_of(&remote);

        if current.expiry_time >= candidate.expiry_time && !current.is_free_plan() {
            tracing::warn!(
                %user_id,
                transaction_id = %remote.id,
                "stale checkout event for an already-applied purchase"
            );
            return Ok(HandlerLog::for_user(user_id, snapshot));
        }

        let was_free_plan = current.is_free_plan();
        self.store.replace(user_id, candidate).await?;

        if was_free_plan {
            // Side effects are fire-and-forget by construction; they cannot
            // change the transition's outcome.
            self.notifier
                .enqueue(NotificationIntent::AccountUpgraded { user_id });
            let amount = format_amount(
                session.currency.as_deref().unwrap_or(""),
                session.amount_total.unwrap_or(0),
            );
            self.notifier.enqueue(NotificationIntent::NewSaleAlert {
                user_id,
                provider: PaymentProvider::Stripe,
                amount,
            });
        }

        Ok(HandlerLog::for_user(user_id, snapshot))
    }

    /// The subscription ended at the processor. The ledger row is kept; a
    /// separate lifecycle process reclaims storage.
    pub async fn subscription_deleted(
        &self,
        remote: &RemoteSubscription,
    ) -> Result<HandlerLog, BillingError> {
        let Some(current) = self
            .store
            .get_by_transaction(&remote.id, PaymentProvider::Stripe)
            .await?
        else {
            tracing::warn!(
                transaction_id = %remote.id,
                "deletion event for an unprovisioned subscription"
            );
            return Ok(HandlerLog::anonymous());
        };
        let user_id = current.user_id;
        let snapshot = snapshot_of(remote);

        let Some(account) = self.users.find(user_id).await? else {
            // Already removed from the system.
            return Ok(HandlerLog::for_user(user_id, snapshot));
        };

        if !remote.skip_notification() && !account.is_dependent_member() {
            let surplus = self.usage.surplus_bonus_bytes(user_id).await?;
            if surplus.unwrap_or(0) <= 0 {
                self.notifier
                    .enqueue(NotificationIntent::SubscriptionEnded { user_id });
            } else {
                tracing::info!(
                    %user_id,
                    surplus = surplus.unwrap_or(0),
                    "surplus bonus storage present, suppressing end notification"
                );
            }
        }

        Ok(HandlerLog::for_user(user_id, snapshot))
    }

    /// The subscription changed at the processor: plan switch or status
    /// movement.
    pub async fn subscription_updated(
        &self,
        remote: &RemoteSubscription,
    ) -> Result<HandlerLog, BillingError> {
        let Some(current) = self
            .store
            .get_by_transaction(&remote.id, PaymentProvider::Stripe)
            .await?
        else {
            tracing::warn!(
                transaction_id = %remote.id,
                "update event for an unprovisioned subscription"
            );
            return Ok(HandlerLog::anonymous());
        };
        let user_id = current.user_id;
        let snapshot = snapshot_of(remote);

        match remote.status {
            RemoteSubscriptionStatus::PastDue => {
                self.notifier.enqueue(NotificationIntent::PaymentOnHold {
                    user_id,
                    provider: PaymentProvider::Stripe,
                });
            }
            RemoteSubscriptionStatus::Active => {
                let candidate = self.subscription_from_remote(user_id, remote)?;
                if candidate.product_id == current.product_id {
                    tracing::warn!(
                        %user_id,
                        transaction_id = %remote.id,
                        "stale update event for an already-applied plan"
                    );
                } else {
                    self.store.replace(user_id, candidate).await?;
                }
            }
            RemoteSubscriptionStatus::Canceled | RemoteSubscriptionStatus::Other => {}
        }

        Ok(HandlerLog::for_user(user_id, snapshot))
    }

    /// A renewal payment landed; extend the paid period.
    pub async fn invoice_paid(&self, invoice: &RemoteInvoice) -> Result<HandlerLog, BillingError> {
        let Some(subscription_id) = invoice.subscription_id.as_deref() else {
            // One-off invoice; nothing to reconcile.
            return Ok(HandlerLog::anonymous());
        };
        let Some(current) = self
            .store
            .get_by_transaction(subscription_id, PaymentProvider::Stripe)
            .await?
        else {
            tracing::warn!(
                transaction_id = %subscription_id,
                "invoice event for an unprovisioned subscription"
            );
            return Ok(HandlerLog::anonymous());
        };
        let user_id = current.user_id;

        // The invoice does not carry the period end; ask the processor of
        // record rather than trusting delivery order.
        let client = self.client_for_row(&current)?;
        let remote = client.get_subscription(subscription_id).await?;
        let snapshot = snapshot_of(&remote);

        let new_expiry = Timestamp::from_unix_secs(remote.current_period_end);
        if new_expiry <= current.expiry_time {
            tracing::warn!(
                %user_id,
                transaction_id = %remote.id,
                "stale invoice for an already-applied period"
            );
            return Ok(HandlerLog::for_user(user_id, snapshot));
        }

        self.store.update_expiry(user_id, new_expiry).await?;
        Ok(HandlerLog::for_user(user_id, snapshot))
    }

    /// Builds the verified candidate subscription for a user, either from a
    /// fresh checkout session or from their live remote subscription.
    pub async fn verified_subscription(
        &self,
        user_id: UserId,
        session_id: Option<&str>,
    ) -> Result<Subscription, BillingError> {
        let current = self.store.get_by_user(user_id).await?;
        let remote = match session_id {
            Some(session_id) => {
                let client = self.client_for_row(&current)?;
                client.subscription_for_session(session_id).await?
            }
            None => {
                if current.payment_provider != PaymentProvider::Stripe {
                    return Err(BillingError::CannotSwitchProvider);
                }
                let client = self.client_for_row(&current)?;
                client
                    .get_subscription(&current.original_transaction_id)
                    .await?
            }
        };
        if remote.status != RemoteSubscriptionStatus::Active {
            return Err(BillingError::BadRequest);
        }
        self.subscription_from_remote(user_id, &remote)
    }

    /// Candidate ledger row for a processor-side subscription: plan and
    /// region resolved from the catalog, quota cached on the row.
    fn subscription_from_remote(
        &self,
        user_id: UserId,
        remote: &RemoteSubscription,
    ) -> Result<Subscription, BillingError> {
        let product_id = remote.price_id().ok_or(BillingError::BadRequest)?;
        let (plan, region) = self
            .catalog
            .resolve(product_id)
            .ok_or(BillingError::NotFound("plan"))?;

        Ok(Subscription {
            user_id,
            payment_provider: PaymentProvider::Stripe,
            product_id: product_id.to_string(),
            storage_quota: plan.storage_quota,
            attributes: SubscriptionAttributes {
                customer_id: remote.customer_id.clone(),
                is_cancelled: false,
                account_region: Some(region),
            },
            original_transaction_id: remote.id.clone(),
            expiry_time: Timestamp::from_unix_secs(remote.current_period_end),
        })
    }

    /// Client for the row's regional account; falls back to the default
    /// account for rows with no processor affinity yet.
    fn client_for_row(
        &self,
        row: &Subscription,
    ) -> Result<&Arc<dyn ProcessorClient>, BillingError> {
        match (row.payment_provider, row.attributes.account_region) {
            (PaymentProvider::Stripe, Some(region)) => {
                Ok(self.registry.client_for(region)?)
            }
            _ => Ok(self.registry.default_client()),
        }
    }

    async fn apply_session_offer(
        &self,
        session: &CheckoutSessionObject,
    ) -> Result<HandlerLog, BillingError> {
        let client = self.registry.default_client();
        let price_id = client.first_price_of_session(&session.id).await?;
        let email = session.customer_email().ok_or(BillingError::BadRequest)?;
        self.offers.apply_offer(email, &price_id).await?;
        Ok(HandlerLog::anonymous())
    }
}

fn snapshot_of(remote: &RemoteSubscription) -> serde_json::Value {
    serde_json::to_value(remote).unwrap_or(serde_json::Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{
        InMemoryStorageUsage, InMemorySubscriptionStore, InMemoryUserDirectory,
        MockProcessorClient, RecordingNotificationQueue, RecordingOfferApplier,
    };
    use crate::domain::billing::plan::{BillingPlan, Region};
    use crate::domain::billing::SKIP_NOTIFICATION_KEY;
    use crate::ports::UserAccount;
    use serde_json::json;
    use std::collections::BTreeMap;

    const PRICE_MONTHLY: &str = "price_eu_50gb_monthly";
    const PRICE_YEARLY: &str = "price_eu_200gb_yearly";
    const PERIOD_END: i64 = 1_735_689_600;

    struct Fixture {
        store: Arc<InMemorySubscriptionStore>,
        client: Arc<MockProcessorClient>,
        users: Arc<InMemoryUserDirectory>,
        usage: Arc<InMemoryStorageUsage>,
        offers: Arc<RecordingOfferApplier>,
        notifier: Arc<RecordingNotificationQueue>,
        reconciler: SubscriptionReconciler,
    }

    fn catalog() -> PlanCatalog {
        let plan = |product: &str, quota: i64| BillingPlan {
            id: product.to_string(),
            product_id: product.to_string(),
            storage_quota: quota,
            price: "2.99".to_string(),
            period: "month".to_string(),
        };
        let mut plans = BTreeMap::new();
        plans.insert(
            Region::Eu,
            vec![plan(PRICE_MONTHLY, 50), plan(PRICE_YEARLY, 200)],
        );
        PlanCatalog::new(plans)
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let client = Arc::new(MockProcessorClient::new());
        let users = Arc::new(InMemoryUserDirectory::new());
        let usage = Arc::new(InMemoryStorageUsage::new());
        let offers = Arc::new(RecordingOfferApplier::new());
        let notifier = Arc::new(RecordingNotificationQueue::new());

        let mut clients: BTreeMap<Region, Arc<dyn ProcessorClient>> = BTreeMap::new();
        clients.insert(Region::Eu, client.clone());
        let registry = Arc::new(ClientRegistry::new(clients, Region::Eu).unwrap());

        let reconciler = SubscriptionReconciler::new(
            store.clone(),
            registry,
            Arc::new(catalog()),
            users.clone(),
            usage.clone(),
            offers.clone(),
            notifier.clone(),
        );

        Fixture {
            store,
            client,
            users,
            usage,
            offers,
            notifier,
            reconciler,
        }
    }

    fn remote_subscription(id: &str, price: &str, period_end: i64) -> RemoteSubscription {
        serde_json::from_value(json!({
            "id": id,
            "customer": "cus_1",
            "status": "active",
            "current_period_end": period_end,
            "items": { "data": [ { "id": "si_1", "price": { "id": price } } ] }
        }))
        .unwrap()
    }

    fn remote_with_status(id: &str, price: &str, status: &str) -> RemoteSubscription {
        serde_json::from_value(json!({
            "id": id,
            "customer": "cus_1",
            "status": status,
            "current_period_end": PERIOD_END,
            "items": { "data": [ { "id": "si_1", "price": { "id": price } } ] }
        }))
        .unwrap()
    }

    fn checkout_session(reference: Option<&str>) -> CheckoutSessionObject {
        serde_json::from_value(json!({
            "id": "cs_1",
            "client_reference_id": reference,
            "customer_details": { "email": "buyer@example.com" },
            "currency": "eur",
            "amount_total": 299
        }))
        .unwrap()
    }

    async fn seed_user(fix: &Fixture, id: i64) -> UserId {
        let user = UserId::new(id);
        fix.store.seed_user(user).await;
        fix.users.insert(UserAccount {
            user_id: user,
            email: format!("user{}@example.com", id),
            plan_admin_id: None,
        });
        user
    }

    async fn seed_paid_user(fix: &Fixture, id: i64) -> UserId {
        let user = seed_user(fix, id).await;
        let remote = remote_subscription("sub_1", PRICE_MONTHLY, PERIOD_END);
        fix.client.put_session_subscription("cs_1", remote);
        fix.reconciler
            .checkout_completed(&checkout_session(Some(&id.to_string())))
            .await
            .unwrap();
        user
    }

    // ══════════════════════════════════════════════════════════════
    // Checkout Completion Tests
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn checkout_upgrades_free_user_and_fires_notifications() {
        let fix = fixture();
        let user = seed_user(&fix, 42).await;
        fix.client.put_session_subscription(
            "cs_1",
            remote_subscription("sub_1", PRICE_MONTHLY, PERIOD_END),
        );

        let log = fix
            .reconciler
            .checkout_completed(&checkout_session(Some("42")))
            .await
            .unwrap();

        assert_eq!(log.user_id, Some(user));
        let row = fix.store.get_by_user(user).await.unwrap();
        assert_eq!(row.product_id, PRICE_MONTHLY);
        assert_eq!(row.storage_quota, 50);
        assert_eq!(row.original_transaction_id, "sub_1");
        assert_eq!(row.expiry_time, Timestamp::from_unix_secs(PERIOD_END));
        assert_eq!(row.attributes.account_region, Some(Region::Eu));

        let intents = fix.notifier.intents();
        assert_eq!(intents.len(), 2);
        assert_eq!(intents[0].tag(), "account_upgraded");
        assert_eq!(intents[1].tag(), "new_sale_alert");
        match &intents[1] {
            NotificationIntent::NewSaleAlert { amount, .. } => assert_eq!(amount, "€2.99"),
            other => panic!("unexpected intent: {:?}", other),
        }
    }

    #[tokio::test]
    async fn checkout_replay_is_a_no_op_without_duplicate_notifications() {
        let fix = fixture();
        let user = seed_paid_user(&fix, 42).await;
        let before = fix.store.get_by_user(user).await.unwrap();
        let intents_before = fix.notifier.count();

        let log = fix
            .reconciler
            .checkout_completed(&checkout_session(Some("42")))
            .await
            .unwrap();

        assert_eq!(log.user_id, Some(user));
        assert_eq!(fix.store.get_by_user(user).await.unwrap(), before);
        assert_eq!(fix.notifier.count(), intents_before);
    }

    #[tokio::test]
    async fn checkout_with_newer_expiry_still_applies_over_paid_row() {
        let fix = fixture();
        let user = seed_paid_user(&fix, 42).await;
        fix.client.put_session_subscription(
            "cs_1",
            remote_subscription("sub_2", PRICE_YEARLY, PERIOD_END + 86_400),
        );

        fix.reconciler
            .checkout_completed(&checkout_session(Some("42")))
            .await
            .unwrap();

        let row = fix.store.get_by_user(user).await.unwrap();
        assert_eq!(row.product_id, PRICE_YEARLY);
        assert_eq!(row.original_transaction_id, "sub_2");
    }

    #[tokio::test]
    async fn checkout_without_reference_delegates_to_offer_service() {
        let fix = fixture();
        fix.client.put_session_price("cs_1", PRICE_MONTHLY);

        let log = fix
            .reconciler
            .checkout_completed(&checkout_session(None))
            .await
            .unwrap();

        assert!(log.user_id.is_none());
        assert_eq!(
            fix.offers.applied(),
            vec![("buyer@example.com".to_string(), PRICE_MONTHLY.to_string())]
        );
        assert_eq!(fix.notifier.count(), 0);
    }

    #[tokio::test]
    async fn checkout_with_inactive_remote_subscription_is_rejected() {
        let fix = fixture();
        seed_user(&fix, 42).await;
        fix.client.put_session_subscription(
            "cs_1",
            remote_with_status("sub_1", PRICE_MONTHLY, "incomplete"),
        );

        let result = fix
            .reconciler
            .checkout_completed(&checkout_session(Some("42")))
            .await;

        assert!(matches!(result, Err(BillingError::BadRequest)));
    }

    // ══════════════════════════════════════════════════════════════
    // Subscription Deletion Tests
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn deletion_for_unprovisioned_subscription_acks_without_log() {
        let fix = fixture();

        let log = fix
            .reconciler
            .subscription_deleted(&remote_subscription("sub_ghost", PRICE_MONTHLY, PERIOD_END))
            .await
            .unwrap();

        assert!(log.user_id.is_none());
        assert_eq!(fix.notifier.count(), 0);
    }

    #[tokio::test]
    async fn deletion_notifies_the_plan_owner() {
        let fix = fixture();
        let user = seed_paid_user(&fix, 42).await;
        let before = fix.notifier.count();

        let log = fix
            .reconciler
            .subscription_deleted(&remote_subscription("sub_1", PRICE_MONTHLY, PERIOD_END))
            .await
            .unwrap();

        assert_eq!(log.user_id, Some(user));
        let intents = fix.notifier.intents();
        assert_eq!(intents.len(), before + 1);
        assert_eq!(intents.last().unwrap().tag(), "subscription_ended");
        // The ledger row survives deletion.
        assert!(fix.store.get_by_user(user).await.is_ok());
    }

    #[tokio::test]
    async fn deletion_with_skip_tag_stays_silent() {
        let fix = fixture();
        seed_paid_user(&fix, 42).await;
        let before = fix.notifier.count();

        let mut remote = remote_subscription("sub_1", PRICE_MONTHLY, PERIOD_END);
        remote
            .metadata
            .insert(SKIP_NOTIFICATION_KEY.to_string(), "true".to_string());
        fix.reconciler.subscription_deleted(&remote).await.unwrap();

        assert_eq!(fix.notifier.count(), before);
    }

    #[tokio::test]
    async fn deletion_with_surplus_bonus_storage_stays_silent() {
        let fix = fixture();
        let user = seed_paid_user(&fix, 42).await;
        fix.usage.set_surplus(user, 1_000_000);
        let before = fix.notifier.count();

        fix.reconciler
            .subscription_deleted(&remote_subscription("sub_1", PRICE_MONTHLY, PERIOD_END))
            .await
            .unwrap();

        assert_eq!(fix.notifier.count(), before);
    }

    #[tokio::test]
    async fn deletion_for_dependent_member_stays_silent() {
        let fix = fixture();
        let user = seed_paid_user(&fix, 42).await;
        fix.users.insert(UserAccount {
            user_id: user,
            email: "member@example.com".to_string(),
            plan_admin_id: Some(UserId::new(7)),
        });
        let before = fix.notifier.count();

        fix.reconciler
            .subscription_deleted(&remote_subscription("sub_1", PRICE_MONTHLY, PERIOD_END))
            .await
            .unwrap();

        assert_eq!(fix.notifier.count(), before);
    }

    #[tokio::test]
    async fn deletion_for_removed_user_is_a_no_op() {
        let fix = fixture();
        let user = seed_paid_user(&fix, 42).await;
        fix.users.remove(user);
        let before = fix.notifier.count();

        let log = fix
            .reconciler
            .subscription_deleted(&remote_subscription("sub_1", PRICE_MONTHLY, PERIOD_END))
            .await
            .unwrap();

        assert_eq!(log.user_id, Some(user));
        assert_eq!(fix.notifier.count(), before);
    }

    // ══════════════════════════════════════════════════════════════
    // Subscription Update Tests
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn update_to_past_due_holds_payment_without_mutation() {
        let fix = fixture();
        let user = seed_paid_user(&fix, 42).await;
        let before = fix.store.get_by_user(user).await.unwrap();

        fix.reconciler
            .subscription_updated(&remote_with_status("sub_1", PRICE_MONTHLY, "past_due"))
            .await
            .unwrap();

        assert_eq!(fix.store.get_by_user(user).await.unwrap(), before);
        assert_eq!(fix.notifier.intents().last().unwrap().tag(), "payment_on_hold");
    }

    #[tokio::test]
    async fn update_with_unchanged_product_is_stale() {
        let fix = fixture();
        let user = seed_paid_user(&fix, 42).await;
        let before = fix.store.get_by_user(user).await.unwrap();

        fix.reconciler
            .subscription_updated(&remote_subscription("sub_1", PRICE_MONTHLY, PERIOD_END))
            .await
            .unwrap();

        assert_eq!(fix.store.get_by_user(user).await.unwrap(), before);
    }

    #[tokio::test]
    async fn update_with_new_product_replaces_plan_and_quota() {
        let fix = fixture();
        let user = seed_paid_user(&fix, 42).await;

        fix.reconciler
            .subscription_updated(&remote_subscription("sub_1", PRICE_YEARLY, PERIOD_END))
            .await
            .unwrap();

        let row = fix.store.get_by_user(user).await.unwrap();
        assert_eq!(row.product_id, PRICE_YEARLY);
        assert_eq!(row.storage_quota, 200);
    }

    #[tokio::test]
    async fn update_never_downgrades_product_through_replay() {
        let fix = fixture();
        let user = seed_paid_user(&fix, 42).await;
        fix.reconciler
            .subscription_updated(&remote_subscription("sub_1", PRICE_YEARLY, PERIOD_END))
            .await
            .unwrap();

        // A late-delivered update still carrying the old product replaces
        // the row only because the processor says so now; replaying the
        // *same* yearly product again must not touch the ledger.
        let before = fix.store.get_by_user(user).await.unwrap();
        fix.reconciler
            .subscription_updated(&remote_subscription("sub_1", PRICE_YEARLY, PERIOD_END))
            .await
            .unwrap();

        assert_eq!(fix.store.get_by_user(user).await.unwrap(), before);
    }

    #[tokio::test]
    async fn update_for_unprovisioned_subscription_acks_without_log() {
        let fix = fixture();

        let log = fix
            .reconciler
            .subscription_updated(&remote_subscription("sub_ghost", PRICE_MONTHLY, PERIOD_END))
            .await
            .unwrap();

        assert!(log.user_id.is_none());
    }

    // ══════════════════════════════════════════════════════════════
    // Verified Subscription Tests
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn verified_subscription_from_session_builds_the_candidate() {
        let fix = fixture();
        let user = seed_user(&fix, 42).await;
        fix.client.put_session_subscription(
            "cs_1",
            remote_subscription("sub_1", PRICE_MONTHLY, PERIOD_END),
        );

        let candidate = fix
            .reconciler
            .verified_subscription(user, Some("cs_1"))
            .await
            .unwrap();

        assert_eq!(candidate.product_id, PRICE_MONTHLY);
        assert_eq!(candidate.original_transaction_id, "sub_1");
        // Verification builds the row; it never persists it.
        assert!(fix.store.get_by_user(user).await.unwrap().is_free_plan());
    }

    #[tokio::test]
    async fn verified_subscription_without_session_requires_this_processor() {
        let fix = fixture();
        let user = seed_user(&fix, 42).await;

        let result = fix.reconciler.verified_subscription(user, None).await;

        assert!(matches!(result, Err(BillingError::CannotSwitchProvider)));
    }

    #[tokio::test]
    async fn verified_subscription_refetches_the_live_remote_state() {
        let fix = fixture();
        let user = seed_paid_user(&fix, 42).await;
        fix.client
            .put_subscription(remote_subscription("sub_1", PRICE_YEARLY, PERIOD_END));

        let candidate = fix
            .reconciler
            .verified_subscription(user, None)
            .await
            .unwrap();

        assert_eq!(candidate.product_id, PRICE_YEARLY);
        assert_eq!(candidate.storage_quota, 200);
    }

    // ══════════════════════════════════════════════════════════════
    // Invoice Tests
    // ══════════════════════════════════════════════════════════════

    fn invoice_for(subscription_id: &str) -> RemoteInvoice {
        serde_json::from_value(json!({ "id": "in_1", "subscription": subscription_id })).unwrap()
    }

    #[tokio::test]
    async fn invoice_with_newer_period_end_extends_expiry_only() {
        let fix = fixture();
        let user = seed_paid_user(&fix, 42).await;
        fix.client.put_subscription(remote_subscription(
            "sub_1",
            PRICE_MONTHLY,
            PERIOD_END + 2_592_000,
        ));

        fix.reconciler.invoice_paid(&invoice_for("sub_1")).await.unwrap();

        let row = fix.store.get_by_user(user).await.unwrap();
        assert_eq!(
            row.expiry_time,
            Timestamp::from_unix_secs(PERIOD_END + 2_592_000)
        );
        assert_eq!(row.product_id, PRICE_MONTHLY);
    }

    #[tokio::test]
    async fn invoice_with_equal_period_end_is_stale() {
        let fix = fixture();
        let user = seed_paid_user(&fix, 42).await;
        fix.client
            .put_subscription(remote_subscription("sub_1", PRICE_MONTHLY, PERIOD_END));
        let before = fix.store.get_by_user(user).await.unwrap();

        fix.reconciler.invoice_paid(&invoice_for("sub_1")).await.unwrap();

        assert_eq!(fix.store.get_by_user(user).await.unwrap(), before);
    }

    #[tokio::test]
    async fn invoice_with_older_period_end_never_regresses_expiry() {
        let fix = fixture();
        let user = seed_paid_user(&fix, 42).await;
        fix.client.put_subscription(remote_subscription(
            "sub_1",
            PRICE_MONTHLY,
            PERIOD_END - 86_400,
        ));

        fix.reconciler.invoice_paid(&invoice_for("sub_1")).await.unwrap();

        let row = fix.store.get_by_user(user).await.unwrap();
        assert_eq!(row.expiry_time, Timestamp::from_unix_secs(PERIOD_END));
    }

    #[tokio::test]
    async fn invoice_for_unprovisioned_subscription_acks_without_log() {
        let fix = fixture();

        let log = fix.reconciler.invoice_paid(&invoice_for("sub_ghost")).await.unwrap();

        assert!(log.user_id.is_none());
    }

    #[tokio::test]
    async fn one_off_invoice_without_subscription_is_ignored() {
        let fix = fixture();
        let invoice: RemoteInvoice =
            serde_json::from_value(json!({ "id": "in_solo" })).unwrap();

        let log = fix.reconciler.invoice_paid(&invoice).await.unwrap();

        assert!(log.user_id.is_none());
    }
}

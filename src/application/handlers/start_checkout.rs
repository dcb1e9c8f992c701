//! StartCheckoutHandler - checkout-session creation passthrough.
//!
//! Thin by design: no reconciliation happens here. Provisioning is driven
//! by the `checkout.session.completed` webhook once payment lands. The one
//! piece of local logic is cancelling a still-active prior subscription
//! (tagged to keep its deletion webhook silent) before re-subscribing.

use std::sync::Arc;

use crate::domain::billing::{BillingError, PaymentProvider, Subscription};
use crate::domain::foundation::{Timestamp, UserId};
use crate::ports::{
    CheckoutSessionRequest, ClientRegistry, SubscriptionStore, UserDirectory,
};

/// Command to start a checkout for a product.
#[derive(Debug, Clone)]
pub struct StartCheckoutCommand {
    pub user_id: UserId,
    pub product_id: String,
    /// Root the processor redirects back to after checkout.
    pub redirect_root_url: String,
}

/// Handler creating processor checkout sessions.
pub struct StartCheckoutHandler {
    store: Arc<dyn SubscriptionStore>,
    registry: Arc<ClientRegistry>,
    users: Arc<dyn UserDirectory>,
    success_path: String,
    cancel_path: String,
}

impl StartCheckoutHandler {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        registry: Arc<ClientRegistry>,
        users: Arc<dyn UserDirectory>,
        success_path: String,
        cancel_path: String,
    ) -> Self {
        Self {
            store,
            registry,
            users,
            success_path,
            cancel_path,
        }
    }

    /// Returns the created session id.
    ///
    /// # Errors
    ///
    /// - `BadRequest` - empty product, or an active subscription that
    ///   cannot be replaced from this entry point
    /// - `NotFound` - the user does not exist
    /// - `Processor` - session creation failed remotely
    pub async fn handle(&self, cmd: StartCheckoutCommand) -> Result<String, BillingError> {
        if cmd.product_id.is_empty() {
            return Err(BillingError::BadRequest);
        }
        let current = self.store.get_by_user(cmd.user_id).await?;
        let now = Timestamp::now();

        let holds_processor_subscription =
            current.payment_provider == PaymentProvider::Stripe;
        if current.is_active_paid(now) {
            if holds_processor_subscription {
                // Plan changes on a live subscription go through the
                // plan-change entry point, not a new checkout.
                return Err(BillingError::BadRequest);
            } else if !current.can_switch_provider(now) {
                return Err(BillingError::CannotSwitchProvider);
            }
        }

        if holds_processor_subscription && !current.attributes.is_cancelled {
            self.cancel_existing_subscription(&current).await?;
        }

        let mut request = CheckoutSessionRequest {
            price_id: cmd.product_id,
            client_reference: Some(cmd.user_id),
            customer_id: None,
            customer_email: None,
            success_url: format!("{}{}", cmd.redirect_root_url, self.success_path),
            cancel_url: format!("{}{}", cmd.redirect_root_url, self.cancel_path),
        };

        let client = if holds_processor_subscription {
            // Attach the purchase to the existing regional customer.
            let region = current
                .attributes
                .account_region
                .ok_or(BillingError::BadRequest)?;
            request.customer_id = Some(current.attributes.customer_id.clone());
            self.registry.client_for(region)?
        } else {
            let account = self
                .users
                .find(cmd.user_id)
                .await?
                .ok_or(BillingError::NotFound("user"))?;
            request.customer_email = Some(account.email);
            self.registry.default_client()
        };

        Ok(client.create_checkout_session(request).await?)
    }

    /// Cancel the user's earlier subscription (usually past-due) before a
    /// fresh checkout, keeping its deletion webhook silent.
    async fn cancel_existing_subscription(
        &self,
        current: &Subscription,
    ) -> Result<(), BillingError> {
        let region = current
            .attributes
            .account_region
            .ok_or(BillingError::BadRequest)?;
        let client = self.registry.client_for(region)?;
        let transaction_id = &current.original_transaction_id;

        match client.tag_skip_notification(transaction_id).await {
            Ok(()) => {
                match client.cancel_now(transaction_id, false).await {
                    Ok(()) => {}
                    Err(err) if err.is_already_resolved() => {
                        tracing::warn!(
                            user_id = %current.user_id,
                            error = %err,
                            "prior subscription already gone during re-subscription"
                        );
                    }
                    Err(err) => return Err(err.into()),
                }
                self.store
                    .update_cancellation(current.user_id, true)
                    .await
                    .map_err(BillingError::from)?;
            }
            Err(err) if err.is_already_resolved() => {
                tracing::warn!(
                    user_id = %current.user_id,
                    error = %err,
                    "prior subscription already resolved remotely"
                );
            }
            Err(err) => return Err(err.into()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{
        InMemorySubscriptionStore, InMemoryUserDirectory, MockProcessorClient,
    };
    use crate::domain::billing::{Region, SubscriptionAttributes};
    use crate::ports::{ProcessorClient, UserAccount};
    use std::collections::BTreeMap;

    struct Fixture {
        store: Arc<InMemorySubscriptionStore>,
        client: Arc<MockProcessorClient>,
        users: Arc<InMemoryUserDirectory>,
        handler: StartCheckoutHandler,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let client = Arc::new(MockProcessorClient::new());
        let users = Arc::new(InMemoryUserDirectory::new());
        let mut clients: BTreeMap<Region, Arc<dyn ProcessorClient>> = BTreeMap::new();
        clients.insert(Region::Eu, client.clone());
        let registry = Arc::new(ClientRegistry::new(clients, Region::Eu).unwrap());

        Fixture {
            store: store.clone(),
            client,
            users: users.clone(),
            handler: StartCheckoutHandler::new(
                store,
                registry,
                users,
                "/checkout/success".to_string(),
                "/checkout/cancel".to_string(),
            ),
        }
    }

    fn cmd(user: UserId) -> StartCheckoutCommand {
        StartCheckoutCommand {
            user_id: user,
            product_id: "price_eu_50gb_monthly".to_string(),
            redirect_root_url: "https://app.skyvault.example".to_string(),
        }
    }

    async fn seed_free(fix: &Fixture) -> UserId {
        let user = UserId::new(1);
        fix.store.seed_user(user).await;
        fix.users.insert(UserAccount {
            user_id: user,
            email: "user@example.com".to_string(),
            plan_admin_id: None,
        });
        user
    }

    async fn seed_processor_row(
        fix: &Fixture,
        expiry: Timestamp,
        cancelled: bool,
    ) -> UserId {
        let user = seed_free(fix).await;
        fix.store
            .put(Subscription {
                user_id: user,
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
            })
            .await;
        user
    }

    #[tokio::test]
    async fn free_user_gets_a_session_with_their_email() {
        let fix = fixture();
        let user = seed_free(&fix).await;

        let session = fix.handler.handle(cmd(user)).await.unwrap();

        assert_eq!(session, "cs_mock_session");
        assert_eq!(
            fix.client.calls(),
            vec!["create_checkout_session price_eu_50gb_monthly".to_string()]
        );
    }

    #[tokio::test]
    async fn empty_product_is_a_bad_request() {
        let fix = fixture();
        let user = seed_free(&fix).await;
        let mut command = cmd(user);
        command.product_id = String::new();

        let result = fix.handler.handle(command).await;

        assert!(matches!(result, Err(BillingError::BadRequest)));
    }

    #[tokio::test]
    async fn live_processor_subscription_rejects_a_new_checkout() {
        let fix = fixture();
        let user = seed_processor_row(&fix, Timestamp::now().add_days(30), false).await;

        let result = fix.handler.handle(cmd(user)).await;

        assert!(matches!(result, Err(BillingError::BadRequest)));
    }

    #[tokio::test]
    async fn live_other_provider_subscription_requires_cancellation_first() {
        let fix = fixture();
        let user = seed_free(&fix).await;
        let mut row = fix.store.get_by_user(user).await.unwrap();
        row.payment_provider = PaymentProvider::AppStore;
        row.product_id = "com.skyvault.50gb".to_string();
        row.original_transaction_id = "txn_mobile".to_string();
        row.expiry_time = Timestamp::now().add_days(30);
        fix.store.put(row).await;

        let result = fix.handler.handle(cmd(user)).await;

        assert!(matches!(result, Err(BillingError::CannotSwitchProvider)));
    }

    #[tokio::test]
    async fn past_due_processor_subscription_is_cancelled_before_resubscribing() {
        let fix = fixture();
        let user = seed_processor_row(&fix, Timestamp::now().add_days(-5), false).await;

        let session = fix.handler.handle(cmd(user)).await.unwrap();

        assert_eq!(session, "cs_mock_session");
        assert_eq!(
            fix.client.calls(),
            vec![
                "tag_skip_notification sub_1".to_string(),
                "cancel_now sub_1 prorate=false".to_string(),
                "create_checkout_session price_eu_50gb_monthly".to_string(),
            ]
        );
        assert!(fix
            .store
            .get_by_user(user)
            .await
            .unwrap()
            .attributes
            .is_cancelled);
    }

    #[tokio::test]
    async fn cancelled_expired_subscription_skips_remote_cancellation() {
        let fix = fixture();
        let user = seed_processor_row(&fix, Timestamp::now().add_days(-40), true).await;

        fix.handler.handle(cmd(user)).await.unwrap();

        assert_eq!(
            fix.client.calls(),
            vec!["create_checkout_session price_eu_50gb_monthly".to_string()]
        );
    }
}

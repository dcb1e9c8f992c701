//! PortalSessionHandler - billing-portal passthrough.

use std::sync::Arc;

use crate::domain::billing::{BillingError, PaymentProvider};
use crate::domain::foundation::UserId;
use crate::ports::{ClientRegistry, SubscriptionStore};

/// Handler returning a processor-hosted portal URL for subscription
/// self-management.
pub struct PortalSessionHandler {
    store: Arc<dyn SubscriptionStore>,
    registry: Arc<ClientRegistry>,
}

impl PortalSessionHandler {
    pub fn new(store: Arc<dyn SubscriptionStore>, registry: Arc<ClientRegistry>) -> Self {
        Self { store, registry }
    }

    /// # Errors
    ///
    /// - `BadRequest` - no processor-held subscription to manage
    /// - `Processor` - session creation failed remotely
    pub async fn handle(
        &self,
        user_id: UserId,
        return_url: &str,
    ) -> Result<String, BillingError> {
        let current = self.store.get_by_user(user_id).await?;
        if current.payment_provider != PaymentProvider::Stripe {
            return Err(BillingError::BadRequest);
        }
        let region = current
            .attributes
            .account_region
            .ok_or(BillingError::BadRequest)?;
        let client = self.registry.client_for(region)?;
        Ok(client
            .create_portal_session(&current.attributes.customer_id, return_url)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemorySubscriptionStore, MockProcessorClient};
    use crate::domain::billing::{Region, Subscription, SubscriptionAttributes};
    use crate::domain::foundation::Timestamp;
    use crate::ports::ProcessorClient;
    use std::collections::BTreeMap;

    fn fixture() -> (Arc<InMemorySubscriptionStore>, PortalSessionHandler) {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let client: Arc<MockProcessorClient> = Arc::new(MockProcessorClient::new());
        let mut clients: BTreeMap<Region, Arc<dyn ProcessorClient>> = BTreeMap::new();
        clients.insert(Region::Eu, client);
        let registry = Arc::new(ClientRegistry::new(clients, Region::Eu).unwrap());
        let handler = PortalSessionHandler::new(store.clone(), registry);
        (store, handler)
    }

    #[tokio::test]
    async fn processor_subscriber_gets_a_portal_url() {
        let (store, handler) = fixture();
        let user = UserId::new(1);
        store
            .put(Subscription {
                user_id: user,
                payment_provider: PaymentProvider::Stripe,
                product_id: "price_eu_50gb_monthly".to_string(),
                storage_quota: 50,
                attributes: SubscriptionAttributes {
                    customer_id: "cus_1".to_string(),
                    is_cancelled: false,
                    account_region: Some(Region::Eu),
                },
                original_transaction_id: "sub_1".to_string(),
                expiry_time: Timestamp::now().add_days(30),
            })
            .await;

        let url = handler
            .handle(user, "https://app.skyvault.example/settings")
            .await
            .unwrap();

        assert!(url.starts_with("https://"));
    }

    #[tokio::test]
    async fn free_user_has_no_portal() {
        let (store, handler) = fixture();
        let user = UserId::new(1);
        store.seed_user(user).await;

        let result = handler.handle(user, "https://app.skyvault.example").await;

        assert!(matches!(result, Err(BillingError::BadRequest)));
    }
}

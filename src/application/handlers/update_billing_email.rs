//! UpdateBillingEmailHandler - propagate an account email change to the
//! processor customer record.

use std::sync::Arc;

use crate::domain::billing::{BillingError, PaymentProvider, Subscription};
use crate::ports::ClientRegistry;

/// Handler keeping the remote customer email in sync with the account.
pub struct UpdateBillingEmailHandler {
    registry: Arc<ClientRegistry>,
}

impl UpdateBillingEmailHandler {
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self { registry }
    }

    /// No-op for rows without a processor customer.
    pub async fn handle(
        &self,
        subscription: &Subscription,
        new_email: &str,
    ) -> Result<(), BillingError> {
        if subscription.payment_provider != PaymentProvider::Stripe {
            return Ok(());
        }
        let region = subscription
            .attributes
            .account_region
            .ok_or(BillingError::BadRequest)?;
        let client = self.registry.client_for(region)?;
        client
            .update_customer_email(&subscription.attributes.customer_id, new_email)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MockProcessorClient;
    use crate::domain::billing::{Region, SubscriptionAttributes};
    use crate::domain::foundation::{Timestamp, UserId};
    use crate::ports::ProcessorClient;
    use std::collections::BTreeMap;

    fn handler_with_client() -> (Arc<MockProcessorClient>, UpdateBillingEmailHandler) {
        let client = Arc::new(MockProcessorClient::new());
        let mut clients: BTreeMap<Region, Arc<dyn ProcessorClient>> = BTreeMap::new();
        clients.insert(Region::Eu, client.clone());
        let registry = Arc::new(ClientRegistry::new(clients, Region::Eu).unwrap());
        (client, UpdateBillingEmailHandler::new(registry))
    }

    fn processor_row() -> Subscription {
        Subscription {
            user_id: UserId::new(1),
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
        }
    }

    #[tokio::test]
    async fn email_change_reaches_the_customer_record() {
        let (client, handler) = handler_with_client();

        handler
            .handle(&processor_row(), "new@example.com")
            .await
            .unwrap();

        assert_eq!(
            client.calls(),
            vec!["update_customer_email cus_1 new@example.com".to_string()]
        );
    }

    #[tokio::test]
    async fn free_row_is_a_silent_no_op() {
        let (client, handler) = handler_with_client();

        handler
            .handle(&Subscription::free(UserId::new(1)), "new@example.com")
            .await
            .unwrap();

        assert!(client.calls().is_empty());
    }
}

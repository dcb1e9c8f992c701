//! CancelAndRemoveHandler - billing side of account deletion.
//!
//! Tags the remote subscription so its deletion webhook stays silent,
//! cancels with proration, records the local cancellation, then deletes the
//! remote customer. Remote responses meaning "already gone" are swallowed
//! as resolved; anything else propagates.

use std::sync::Arc;

use crate::domain::billing::{BillingError, Subscription};
use crate::ports::{ClientRegistry, SubscriptionStore};

/// Handler for cancelling billing and removing the processor customer
/// during account deletion.
pub struct CancelAndRemoveHandler {
    store: Arc<dyn SubscriptionStore>,
    registry: Arc<ClientRegistry>,
}

impl CancelAndRemoveHandler {
    pub fn new(store: Arc<dyn SubscriptionStore>, registry: Arc<ClientRegistry>) -> Self {
        Self { store, registry }
    }

    /// # Errors
    ///
    /// - `Processor` - a remote step failed for a reason other than the
    ///   resource already being gone
    /// - `Store` - recording the local cancellation failed
    pub async fn handle(&self, subscription: &Subscription) -> Result<(), BillingError> {
        let region = subscription
            .attributes
            .account_region
            .ok_or(BillingError::BadRequest)?;
        let client = self.registry.client_for(region)?;
        let transaction_id = &subscription.original_transaction_id;

        if !subscription.attributes.is_cancelled {
            match client.tag_skip_notification(transaction_id).await {
                Ok(()) => {
                    tracing::info!(
                        user_id = %subscription.user_id,
                        %transaction_id,
                        "cancelling subscription with prorated credit"
                    );
                    match client.cancel_now(transaction_id, true).await {
                        Ok(()) => {}
                        Err(err) if err.is_already_resolved() => {
                            tracing::warn!(
                                user_id = %subscription.user_id,
                                error = %err,
                                "subscription already gone during cancellation"
                            );
                        }
                        Err(err) => return Err(err.into()),
                    }
                    self.store
                        .update_cancellation(subscription.user_id, true)
                        .await
                        .map_err(BillingError::from)?;
                }
                Err(err) if err.is_already_resolved() => {
                    tracing::warn!(
                        user_id = %subscription.user_id,
                        error = %err,
                        "subscription already resolved remotely, skipping cancellation"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        tracing::info!(
            user_id = %subscription.user_id,
            customer_id = %subscription.attributes.customer_id,
            "deleting processor customer"
        );
        match client
            .delete_customer(&subscription.attributes.customer_id)
            .await
        {
            Ok(()) => Ok(()),
            Err(err) if err.is_already_resolved() => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

//! SetCancellationHandler - toggles cancel-at-period-end.
//!
//! Remote and local state must move together. There is no compensating
//! rollback: a remote success followed by a local persistence failure is a
//! `PartialFailure` logged at high severity for manual reconciliation.

use std::sync::Arc;

use crate::domain::billing::{BillingError, PaymentProvider, Subscription};
use crate::domain::foundation::UserId;
use crate::ports::{ClientRegistry, SubscriptionStore};

/// Command to set or clear the cancellation flag.
#[derive(Debug, Clone)]
pub struct SetCancellationCommand {
    pub user_id: UserId,
    pub cancel: bool,
}

/// Handler for the cancellation toggle.
pub struct SetCancellationHandler {
    store: Arc<dyn SubscriptionStore>,
    registry: Arc<ClientRegistry>,
}

impl SetCancellationHandler {
    pub fn new(store: Arc<dyn SubscriptionStore>, registry: Arc<ClientRegistry>) -> Self {
        Self { store, registry }
    }

    /// Returns the updated subscription view.
    ///
    /// # Errors
    ///
    /// - `BadRequest` - the subscription is not held with this processor
    /// - `Processor` - the remote flag update failed
    /// - `PartialFailure` - remote updated but local persistence failed
    pub async fn handle(&self, cmd: SetCancellationCommand) -> Result<Subscription, BillingError> {
        let mut current = self.store.get_by_user(cmd.user_id).await?;
        if current.payment_provider != PaymentProvider::Stripe {
            return Err(BillingError::BadRequest);
        }

        if current.attributes.is_cancelled == cmd.cancel {
            return Ok(current);
        }

        let region = current
            .attributes
            .account_region
            .ok_or(BillingError::BadRequest)?;
        let client = self.registry.client_for(region)?;
        client
            .set_cancel_at_period_end(&current.original_transaction_id, cmd.cancel)
            .await?;

        if let Err(err) = self
            .store
            .update_cancellation(cmd.user_id, cmd.cancel)
            .await
        {
            tracing::error!(
                user_id = %cmd.user_id,
                cancel = cmd.cancel,
                error = %err,
                "remote cancellation flag updated but local persistence failed"
            );
            return Err(BillingError::PartialFailure(format!(
                "remote cancellation flag set to {} but ledger update failed: {}",
                cmd.cancel, err
            )));
        }

        current.attributes.is_cancelled = cmd.cancel;
        Ok(current)
    }
}

//! ChangePlanHandler - user-initiated plan switch on an existing
//! subscription.
//!
//! The remote subscription is the source of truth: this handler updates the
//! processor-side price and returns. The ledger row converges through the
//! asynchronous `customer.subscription.updated` webhook, never
//! synchronously here.

use std::sync::Arc;

use crate::domain::billing::{
    BillingError, DowngradeChecker, ErrorClass, PaymentProvider, PlanCatalog,
};
use crate::domain::foundation::UserId;
use crate::ports::{ClientRegistry, PendingPaymentState, SubscriptionStore};

/// Command to switch a user's plan to a new processor product.
#[derive(Debug, Clone)]
pub struct ChangePlanCommand {
    pub user_id: UserId,
    pub product_id: String,
}

/// How the plan change settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanChangeStatus {
    /// The update settled immediately.
    Success,
    /// The pending invoice needs further authentication by the client.
    RequiresAction,
    /// The payment method was rejected; the user must supply another.
    RequiresPaymentMethod,
}

/// Result of a plan change request.
#[derive(Debug, Clone)]
pub struct PlanChangeResult {
    pub status: PlanChangeStatus,
    /// Secret completing authentication when status is `RequiresAction`.
    pub client_secret: Option<String>,
}

impl PlanChangeResult {
    fn success() -> Self {
        Self {
            status: PlanChangeStatus::Success,
            client_secret: None,
        }
    }

    fn requires_payment_method() -> Self {
        Self {
            status: PlanChangeStatus::RequiresPaymentMethod,
            client_secret: None,
        }
    }

    fn requires_action(client_secret: Option<String>) -> Self {
        Self {
            status: PlanChangeStatus::RequiresAction,
            client_secret,
        }
    }
}

/// Handler for user-initiated plan changes.
pub struct ChangePlanHandler {
    store: Arc<dyn SubscriptionStore>,
    registry: Arc<ClientRegistry>,
    catalog: Arc<PlanCatalog>,
    downgrade: DowngradeChecker,
}

impl ChangePlanHandler {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        registry: Arc<ClientRegistry>,
        catalog: Arc<PlanCatalog>,
        downgrade: DowngradeChecker,
    ) -> Self {
        Self {
            store,
            registry,
            catalog,
            downgrade,
        }
    }

    /// # Errors
    ///
    /// - `BadRequest` - wrong provider, same product, or cross-region switch
    /// - `NotFound` - the target product is not in any catalog
    /// - `CannotDowngrade` - consumed storage exceeds the target quota
    /// - `Processor` - the remote update failed for a non-decline reason
    pub async fn handle(&self, cmd: ChangePlanCommand) -> Result<PlanChangeResult, BillingError> {
        let current = self.store.get_by_user(cmd.user_id).await?;
        let (plan, region) = self
            .catalog
            .resolve(&cmd.product_id)
            .ok_or(BillingError::NotFound("plan"))?;

        // Region pins the customer identity; cross-region switches are
        // unsupported.
        if current.payment_provider != PaymentProvider::Stripe
            || current.product_id == cmd.product_id
            || current.attributes.account_region != Some(region)
        {
            return Err(BillingError::BadRequest);
        }

        if plan.storage_quota < current.storage_quota
            && !self
                .downgrade
                .can_downgrade(plan.storage_quota, cmd.user_id)
                .await?
        {
            return Err(BillingError::CannotDowngrade);
        }

        let client = self.registry.client_for(region)?;
        let remote = client
            .get_subscription(&current.original_transaction_id)
            .await?;
        let item_id = remote.item_id().ok_or(BillingError::BadRequest)?;

        let update = match client
            .update_price(&current.original_transaction_id, item_id, &cmd.product_id)
            .await
        {
            Ok(update) => update,
            Err(err) if err.class == ErrorClass::CardDeclined => {
                return Ok(PlanChangeResult::requires_payment_method());
            }
            Err(err) => return Err(err.into()),
        };

        let Some(pending) = update.pending else {
            return Ok(PlanChangeResult::success());
        };
        match pending.payment_state {
            PendingPaymentState::RequiresAction => {
                Ok(PlanChangeResult::requires_action(pending.client_secret))
            }
            PendingPaymentState::RequiresPaymentMethod => {
                if let Err(err) = client.void_invoice(&pending.invoice_id).await {
                    tracing::warn!(
                        user_id = %cmd.user_id,
                        invoice_id = %pending.invoice_id,
                        error = %err,
                        "failed to void pending invoice"
                    );
                }
                Ok(PlanChangeResult::requires_payment_method())
            }
            PendingPaymentState::Other => Err(BillingError::BadRequest),
        }
    }
}

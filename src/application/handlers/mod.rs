//! Command handlers for user-initiated billing operations.
//!
//! One handler per operation; webhook-driven reconciliation lives in the
//! domain (`WebhookDispatcher` + `SubscriptionReconciler`), not here.

mod change_plan;
mod portal;
mod remove_account;
mod start_checkout;
mod toggle_cancellation;
mod update_billing_email;

pub use change_plan::{
    ChangePlanCommand, ChangePlanHandler, PlanChangeResult, PlanChangeStatus,
};
pub use portal::PortalSessionHandler;
pub use remove_account::CancelAndRemoveHandler;
pub use start_checkout::{StartCheckoutCommand, StartCheckoutHandler};
pub use toggle_cancellation::{SetCancellationCommand, SetCancellationHandler};
pub use update_billing_email::UpdateBillingEmailHandler;

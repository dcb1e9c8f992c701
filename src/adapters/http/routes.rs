//! Axum router configuration for the billing endpoints.

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{
    change_plan, handle_webhook, portal, set_cancellation, start_checkout, verify_subscription,
    BillingAppState,
};

/// User-facing billing routes (authentication middleware required).
///
/// - `POST /plan` - switch plan
/// - `POST /cancel` - toggle cancel-at-period-end
/// - `POST /checkout` - create a checkout session
/// - `POST /verify` - verify the subscription after checkout redirect
/// - `GET  /portal` - processor-hosted management portal
pub fn billing_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/plan", post(change_plan))
        .route("/cancel", post(set_cancellation))
        .route("/checkout", post(start_checkout))
        .route("/verify", post(verify_subscription))
        .route("/portal", get(portal))
}

/// Webhook routes; no user authentication, verified by signature.
///
/// - `POST /{region}` - inbound processor deliveries for one region
pub fn webhook_routes() -> Router<BillingAppState> {
    Router::new().route("/:region", post(handle_webhook))
}

/// Complete billing module router, mountable at the application root.
pub fn billing_router() -> Router<BillingAppState> {
    Router::new()
        .nest("/billing", billing_routes())
        .nest("/webhooks", webhook_routes())
}

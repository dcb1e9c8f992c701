//! HTTP adapter - axum surface for webhooks and user-initiated billing.

mod dto;
mod handlers;
mod routes;

pub use dto::{
    CancellationRequest, CheckoutRequest, CheckoutResponse, ErrorResponse, PlanChangeRequest,
    PlanChangeResponse, PortalResponse, SubscriptionView, VerifyRequest,
};
pub use handlers::{BillingAppState, SIGNATURE_HEADER};
pub use routes::{billing_router, billing_routes, webhook_routes};

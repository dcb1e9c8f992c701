//! HTTP handlers for the billing endpoints.
//!
//! Handlers connect axum routes to the application command handlers and
//! the webhook dispatcher. Authentication is an external middleware
//! concern; user-facing handlers read the caller's id from request
//! extensions.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;

use crate::application::handlers::{
    CancelAndRemoveHandler, ChangePlanCommand, ChangePlanHandler, PortalSessionHandler,
    SetCancellationCommand, SetCancellationHandler, StartCheckoutCommand, StartCheckoutHandler,
    UpdateBillingEmailHandler,
};
use crate::domain::billing::{
    BillingError, DowngradeChecker, PlanCatalog, Region, SubscriptionReconciler,
    WebhookDispatcher,
};
use crate::domain::foundation::UserId;
use crate::ports::{
    ClientRegistry, StorageUsage, SubscriptionStore, UserDirectory,
};

use super::dto::{
    CancellationRequest, CheckoutRequest, CheckoutResponse, ErrorResponse, PlanChangeRequest,
    PlanChangeResponse, PortalResponse, SubscriptionView, VerifyRequest,
};

/// Header carrying the processor's delivery signature.
pub const SIGNATURE_HEADER: &str = "processor-signature";

/// Shared application state; cloned per request, dependencies Arc-wrapped.
#[derive(Clone)]
pub struct BillingAppState {
    pub store: Arc<dyn SubscriptionStore>,
    pub registry: Arc<ClientRegistry>,
    pub catalog: Arc<PlanCatalog>,
    pub users: Arc<dyn UserDirectory>,
    pub usage: Arc<dyn StorageUsage>,
    pub reconciler: Arc<SubscriptionReconciler>,
    pub dispatcher: Arc<WebhookDispatcher>,
    pub checkout_success_path: String,
    pub checkout_cancel_path: String,
}

impl BillingAppState {
    /// Create handlers on demand from the shared state.
    pub fn change_plan_handler(&self) -> ChangePlanHandler {
        ChangePlanHandler::new(
            self.store.clone(),
            self.registry.clone(),
            self.catalog.clone(),
            DowngradeChecker::new(self.usage.clone()),
        )
    }

    pub fn cancellation_handler(&self) -> SetCancellationHandler {
        SetCancellationHandler::new(self.store.clone(), self.registry.clone())
    }

    pub fn checkout_handler(&self) -> StartCheckoutHandler {
        StartCheckoutHandler::new(
            self.store.clone(),
            self.registry.clone(),
            self.users.clone(),
            self.checkout_success_path.clone(),
            self.checkout_cancel_path.clone(),
        )
    }

    pub fn portal_handler(&self) -> PortalSessionHandler {
        PortalSessionHandler::new(self.store.clone(), self.registry.clone())
    }

    pub fn remove_handler(&self) -> CancelAndRemoveHandler {
        CancelAndRemoveHandler::new(self.store.clone(), self.registry.clone())
    }

    pub fn billing_email_handler(&self) -> UpdateBillingEmailHandler {
        UpdateBillingEmailHandler::new(self.registry.clone())
    }
}

fn billing_error(err: BillingError) -> Response {
    (err.status_code(), Json(ErrorResponse::from(&err))).into_response()
}

/// `POST /webhooks/{region}` - inbound processor deliveries.
pub async fn handle_webhook(
    State(state): State<BillingAppState>,
    Path(region): Path<Region>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(signature) = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "missing signature header".to_string(),
            }),
        )
            .into_response();
    };

    match state.dispatcher.handle(&body, signature, region).await {
        Ok(_) => (StatusCode::OK, Json(serde_json::json!({ "received": true })))
            .into_response(),
        Err(err) => {
            tracing::warn!(%region, error = %err, "webhook delivery rejected");
            (
                err.status_code(),
                Json(ErrorResponse {
                    error: err.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// `POST /billing/plan` - switch plan on the existing subscription.
pub async fn change_plan(
    State(state): State<BillingAppState>,
    Extension(user_id): Extension<UserId>,
    Json(request): Json<PlanChangeRequest>,
) -> Response {
    let command = ChangePlanCommand {
        user_id,
        product_id: request.product_id,
    };
    match state.change_plan_handler().handle(command).await {
        Ok(result) => Json(PlanChangeResponse::from(result)).into_response(),
        Err(err) => billing_error(err),
    }
}

/// `POST /billing/cancel` - toggle cancel-at-period-end.
pub async fn set_cancellation(
    State(state): State<BillingAppState>,
    Extension(user_id): Extension<UserId>,
    Json(request): Json<CancellationRequest>,
) -> Response {
    let command = SetCancellationCommand {
        user_id,
        cancel: request.cancel,
    };
    match state.cancellation_handler().handle(command).await {
        Ok(subscription) => Json(SubscriptionView::from(subscription)).into_response(),
        Err(err) => billing_error(err),
    }
}

/// `POST /billing/checkout` - create a checkout session.
pub async fn start_checkout(
    State(state): State<BillingAppState>,
    Extension(user_id): Extension<UserId>,
    Json(request): Json<CheckoutRequest>,
) -> Response {
    let command = StartCheckoutCommand {
        user_id,
        product_id: request.product_id,
        redirect_root_url: request.redirect_root_url,
    };
    match state.checkout_handler().handle(command).await {
        Ok(session_id) => Json(CheckoutResponse { session_id }).into_response(),
        Err(err) => billing_error(err),
    }
}

/// `POST /billing/verify` - verify the subscription after checkout
/// redirect (or re-verify the live one) without mutating the ledger.
pub async fn verify_subscription(
    State(state): State<BillingAppState>,
    Extension(user_id): Extension<UserId>,
    Json(request): Json<VerifyRequest>,
) -> Response {
    match state
        .reconciler
        .verified_subscription(user_id, request.session_id.as_deref())
        .await
    {
        Ok(subscription) => Json(SubscriptionView::from(subscription)).into_response(),
        Err(err) => billing_error(err),
    }
}

#[derive(Debug, Deserialize)]
pub struct PortalQuery {
    pub redirect_root_url: String,
}

/// `GET /billing/portal` - processor-hosted management portal.
pub async fn portal(
    State(state): State<BillingAppState>,
    Extension(user_id): Extension<UserId>,
    Query(query): Query<PortalQuery>,
) -> Response {
    match state
        .portal_handler()
        .handle(user_id, &query.redirect_root_url)
        .await
    {
        Ok(url) => Json(PortalResponse { url }).into_response(),
        Err(err) => billing_error(err),
    }
}

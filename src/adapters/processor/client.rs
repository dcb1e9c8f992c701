//! HTTP processor client.
//!
//! Implements `ProcessorClient` against the processor's form-encoded REST
//! API, one instance per regional account. Failures are normalized into
//! `ProcessorError` classes here; nothing downstream sees HTTP shapes.
//!
//! # Security
//!
//! API keys are held as `secrecy::SecretString` and exposed only at the
//! request boundary.

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};

use crate::domain::billing::{ProcessorError, RemoteSubscription};
use crate::ports::{
    CheckoutSessionRequest, PendingPaymentState, PendingUpdate, PriceUpdate, ProcessorClient,
};

use super::types::{
    ApiErrorBody, CreatedPortalSession, CreatedSession, ExpandedCheckoutSession, LineItemList,
    UpdatedSubscription,
};
use crate::domain::billing::SKIP_NOTIFICATION_KEY;

/// Configuration for one regional processor account.
#[derive(Clone)]
pub struct ProcessorAccountConfig {
    api_key: SecretString,
    api_base_url: String,
}

impl ProcessorAccountConfig {
    /// Creates a configuration with the default API host.
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            api_base_url: "https://api.stripe.com".to_string(),
        }
    }

    /// Override the API host (testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

/// reqwest-backed `ProcessorClient` for one regional account.
pub struct HttpProcessorClient {
    config: ProcessorAccountConfig,
    http: reqwest::Client,
}

impl HttpProcessorClient {
    pub fn new(config: ProcessorAccountConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url, path)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ProcessorError> {
        let response = self
            .http
            .get(self.url(path))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .query(query)
            .send()
            .await
            .map_err(|e| ProcessorError::other(e.to_string()))?;
        Self::decode(response).await
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ProcessorError> {
        let response = self
            .http
            .post(self.url(path))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(params)
            .send()
            .await
            .map_err(|e| ProcessorError::other(e.to_string()))?;
        Self::decode(response).await
    }

    async fn delete_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ProcessorError> {
        let response = self
            .http
            .delete(self.url(path))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .query(query)
            .send()
            .await
            .map_err(|e| ProcessorError::other(e.to_string()))?;
        Self::decode(response).await
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ProcessorError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| ProcessorError::other(format!("malformed response: {}", e)));
        }

        let body: ApiErrorBody = response.json().await.unwrap_or_default();
        let err = classify(status, &body);
        tracing::warn!(
            status = status.as_u16(),
            class = ?err.class,
            message = %err.message,
            "processor API call failed"
        );
        Err(err)
    }
}

/// Maps the processor's error shape to a normalized class.
fn classify(status: StatusCode, body: &ApiErrorBody) -> ProcessorError {
    let message = body
        .error
        .message
        .clone()
        .unwrap_or_else(|| format!("http status {}", status.as_u16()));

    if body.error.error_type.as_deref() == Some("card_error") {
        return ProcessorError::card_declined(message);
    }
    if status == StatusCode::NOT_FOUND || body.error.code.as_deref() == Some("resource_missing") {
        return ProcessorError::not_found(message);
    }
    if status == StatusCode::BAD_REQUEST
        || body.error.error_type.as_deref() == Some("invalid_request_error")
    {
        return ProcessorError::invalid_request(message);
    }
    ProcessorError::other(message)
}

#[async_trait]
impl ProcessorClient for HttpProcessorClient {
    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<RemoteSubscription, ProcessorError> {
        self.get_json(&format!("/v1/subscriptions/{}", subscription_id), &[])
            .await
    }

    async fn subscription_for_session(
        &self,
        session_id: &str,
    ) -> Result<RemoteSubscription, ProcessorError> {
        let session: ExpandedCheckoutSession = self
            .get_json(
                &format!("/v1/checkout/sessions/{}", session_id),
                &[("expand[]", "subscription")],
            )
            .await?;
        session
            .subscription
            .ok_or_else(|| ProcessorError::invalid_request("session has no subscription"))
    }

    async fn first_price_of_session(&self, session_id: &str) -> Result<String, ProcessorError> {
        let items: LineItemList = self
            .get_json(
                &format!("/v1/checkout/sessions/{}/line_items", session_id),
                &[("expand[]", "data.price")],
            )
            .await?;
        items
            .data
            .into_iter()
            .next()
            .map(|item| item.price.id)
            .ok_or_else(|| ProcessorError::not_found("session has no line items"))
    }

    async fn update_price(
        &self,
        subscription_id: &str,
        item_id: &str,
        price_id: &str,
    ) -> Result<PriceUpdate, ProcessorError> {
        let params = [
            ("proration_behavior", "always_invoice".to_string()),
            ("payment_behavior", "pending_if_incomplete".to_string()),
            ("items[0][id]", item_id.to_string()),
            ("items[0][price]", price_id.to_string()),
            ("expand[]", "latest_invoice.payment_intent".to_string()),
        ];
        let updated: UpdatedSubscription = self
            .post_form(&format!("/v1/subscriptions/{}", subscription_id), &params)
            .await?;

        if updated.pending_update.is_none() {
            return Ok(PriceUpdate::default());
        }

        let invoice = updated
            .latest_invoice
            .ok_or_else(|| ProcessorError::other("pending update without latest invoice"))?;
        let intent = invoice
            .payment_intent
            .ok_or_else(|| ProcessorError::other("pending update without payment intent"))?;
        let payment_state = match intent.status.as_str() {
            "requires_action" => PendingPaymentState::RequiresAction,
            "requires_payment_method" => PendingPaymentState::RequiresPaymentMethod,
            _ => PendingPaymentState::Other,
        };

        Ok(PriceUpdate {
            pending: Some(PendingUpdate {
                payment_state,
                invoice_id: invoice.id,
                client_secret: intent.client_secret,
            }),
        })
    }

    async fn set_cancel_at_period_end(
        &self,
        subscription_id: &str,
        cancel: bool,
    ) -> Result<(), ProcessorError> {
        let params = [("cancel_at_period_end", cancel.to_string())];
        let _: serde_json::Value = self
            .post_form(&format!("/v1/subscriptions/{}", subscription_id), &params)
            .await?;
        Ok(())
    }

    async fn tag_skip_notification(&self, subscription_id: &str) -> Result<(), ProcessorError> {
        let key = format!("metadata[{}]", SKIP_NOTIFICATION_KEY);
        let params = [(key.as_str(), "true".to_string())];
        let _: serde_json::Value = self
            .post_form(&format!("/v1/subscriptions/{}", subscription_id), &params)
            .await?;
        Ok(())
    }

    async fn cancel_now(
        &self,
        subscription_id: &str,
        prorate: bool,
    ) -> Result<(), ProcessorError> {
        let prorate = prorate.to_string();
        let _: serde_json::Value = self
            .delete_json(
                &format!("/v1/subscriptions/{}", subscription_id),
                &[("prorate", prorate.as_str())],
            )
            .await?;
        Ok(())
    }

    async fn delete_customer(&self, customer_id: &str) -> Result<(), ProcessorError> {
        let _: serde_json::Value = self
            .delete_json(&format!("/v1/customers/{}", customer_id), &[])
            .await?;
        Ok(())
    }

    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<String, ProcessorError> {
        let mut params = vec![
            ("mode", "subscription".to_string()),
            ("line_items[0][price]", request.price_id),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", request.success_url),
            ("cancel_url", request.cancel_url),
            ("allow_promotion_codes", "true".to_string()),
        ];
        if let Some(user_id) = request.client_reference {
            params.push(("client_reference_id", user_id.to_string()));
        }
        if let Some(customer_id) = request.customer_id {
            params.push(("customer", customer_id));
        }
        if let Some(email) = request.customer_email {
            params.push(("customer_email", email));
        }

        let session: CreatedSession = self.post_form("/v1/checkout/sessions", &params).await?;
        Ok(session.id)
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<String, ProcessorError> {
        let params = [
            ("customer", customer_id.to_string()),
            ("return_url", return_url.to_string()),
        ];
        let session: CreatedPortalSession =
            self.post_form("/v1/billing_portal/sessions", &params).await?;
        Ok(session.url)
    }

    async fn void_invoice(&self, invoice_id: &str) -> Result<(), ProcessorError> {
        let _: serde_json::Value = self
            .post_form(&format!("/v1/invoices/{}/void", invoice_id), &[])
            .await?;
        Ok(())
    }

    async fn update_customer_email(
        &self,
        customer_id: &str,
        email: &str,
    ) -> Result<(), ProcessorError> {
        let params = [("email", email.to_string())];
        let _: serde_json::Value = self
            .post_form(&format!("/v1/customers/{}", customer_id), &params)
            .await?;
        Ok(())
    }
}

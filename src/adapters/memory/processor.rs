//! Programmable in-memory processor client.
//!
//! Stands in for a regional processor account in tests: remote
//! subscriptions and sessions are seeded up front, every mutating call is
//! recorded, and individual methods can be primed to fail with a chosen
//! error class.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::billing::{ProcessorError, RemoteSubscription};
use crate::ports::{
    CheckoutSessionRequest, PriceUpdate, ProcessorClient,
};

/// In-memory `ProcessorClient` double.
#[derive(Default)]
pub struct MockProcessorClient {
    subscriptions: Mutex<HashMap<String, RemoteSubscription>>,
    session_subscriptions: Mutex<HashMap<String, RemoteSubscription>>,
    session_prices: Mutex<HashMap<String, String>>,
    update_price_result: Mutex<Option<Result<PriceUpdate, ProcessorError>>>,
    failures: Mutex<HashMap<&'static str, ProcessorError>>,
    calls: Mutex<Vec<String>>,
}

impl MockProcessorClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a remote subscription reachable by id.
    pub fn put_subscription(&self, subscription: RemoteSubscription) {
        self.subscriptions
            .lock()
            .expect("mock lock poisoned")
            .insert(subscription.id.clone(), subscription);
    }

    /// Seed the subscription attached to a checkout session.
    pub fn put_session_subscription(&self, session_id: &str, subscription: RemoteSubscription) {
        self.session_subscriptions
            .lock()
            .expect("mock lock poisoned")
            .insert(session_id.to_string(), subscription);
    }

    /// Seed the first line-item price of a checkout session.
    pub fn put_session_price(&self, session_id: &str, price_id: &str) {
        self.session_prices
            .lock()
            .expect("mock lock poisoned")
            .insert(session_id.to_string(), price_id.to_string());
    }

    /// Prime the next `update_price` call.
    pub fn prime_update_price(&self, result: Result<PriceUpdate, ProcessorError>) {
        *self.update_price_result.lock().expect("mock lock poisoned") = Some(result);
    }

    /// Prime a method (by name) to fail.
    pub fn fail(&self, method: &'static str, error: ProcessorError) {
        self.failures
            .lock()
            .expect("mock lock poisoned")
            .insert(method, error);
    }

    /// Every mutating call, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("mock lock poisoned").clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("mock lock poisoned").push(call);
    }

    fn check_failure(&self, method: &'static str) -> Result<(), ProcessorError> {
        match self.failures.lock().expect("mock lock poisoned").get(method) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ProcessorClient for MockProcessorClient {
    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<RemoteSubscription, ProcessorError> {
        self.check_failure("get_subscription")?;
        self.subscriptions
            .lock()
            .expect("mock lock poisoned")
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| ProcessorError::not_found("no such subscription"))
    }

    async fn subscription_for_session(
        &self,
        session_id: &str,
    ) -> Result<RemoteSubscription, ProcessorError> {
        self.check_failure("subscription_for_session")?;
        self.session_subscriptions
            .lock()
            .expect("mock lock poisoned")
            .get(session_id)
            .cloned()
            .ok_or_else(|| ProcessorError::not_found("no such session"))
    }

    async fn first_price_of_session(&self, session_id: &str) -> Result<String, ProcessorError> {
        self.check_failure("first_price_of_session")?;
        self.session_prices
            .lock()
            .expect("mock lock poisoned")
            .get(session_id)
            .cloned()
            .ok_or_else(|| ProcessorError::not_found("no line items"))
    }

    async fn update_price(
        &self,
        subscription_id: &str,
        item_id: &str,
        price_id: &str,
    ) -> Result<PriceUpdate, ProcessorError> {
        self.record(format!(
            "update_price {} {} {}",
            subscription_id, item_id, price_id
        ));
        match self
            .update_price_result
            .lock()
            .expect("mock lock poisoned")
            .take()
        {
            Some(result) => result,
            None => Ok(PriceUpdate::default()),
        }
    }

    async fn set_cancel_at_period_end(
        &self,
        subscription_id: &str,
        cancel: bool,
    ) -> Result<(), ProcessorError> {
        self.check_failure("set_cancel_at_period_end")?;
        self.record(format!(
            "set_cancel_at_period_end {} {}",
            subscription_id, cancel
        ));
        if let Some(sub) = self
            .subscriptions
            .lock()
            .expect("mock lock poisoned")
            .get_mut(subscription_id)
        {
            sub.cancel_at_period_end = cancel;
        }
        Ok(())
    }

    async fn tag_skip_notification(&self, subscription_id: &str) -> Result<(), ProcessorError> {
        self.check_failure("tag_skip_notification")?;
        self.record(format!("tag_skip_notification {}", subscription_id));
        Ok(())
    }

    async fn cancel_now(
        &self,
        subscription_id: &str,
        prorate: bool,
    ) -> Result<(), ProcessorError> {
        self.check_failure("cancel_now")?;
        self.record(format!("cancel_now {} prorate={}", subscription_id, prorate));
        Ok(())
    }

    async fn delete_customer(&self, customer_id: &str) -> Result<(), ProcessorError> {
        self.check_failure("delete_customer")?;
        self.record(format!("delete_customer {}", customer_id));
        Ok(())
    }

    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<String, ProcessorError> {
        self.check_failure("create_checkout_session")?;
        self.record(format!("create_checkout_session {}", request.price_id));
        Ok("cs_mock_session".to_string())
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        _return_url: &str,
    ) -> Result<String, ProcessorError> {
        self.check_failure("create_portal_session")?;
        self.record(format!("create_portal_session {}", customer_id));
        Ok("https://portal.processor.example/session".to_string())
    }

    async fn void_invoice(&self, invoice_id: &str) -> Result<(), ProcessorError> {
        self.check_failure("void_invoice")?;
        self.record(format!("void_invoice {}", invoice_id));
        Ok(())
    }

    async fn update_customer_email(
        &self,
        customer_id: &str,
        email: &str,
    ) -> Result<(), ProcessorError> {
        self.check_failure("update_customer_email")?;
        self.record(format!("update_customer_email {} {}", customer_id, email));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::ErrorClass;
    use serde_json::json;

    fn remote(id: &str) -> RemoteSubscription {
        serde_json::from_value(json!({
            "id": id,
            "customer": "cus_1",
            "status": "active",
            "current_period_end": 1_735_689_600
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn seeded_subscriptions_are_returned() {
        let client = MockProcessorClient::new();
        client.put_subscription(remote("sub_1"));

        let sub = client.get_subscription("sub_1").await.unwrap();

        assert_eq!(sub.id, "sub_1");
    }

    #[tokio::test]
    async fn unseeded_lookups_are_not_found() {
        let client = MockProcessorClient::new();
        let err = client.get_subscription("sub_missing").await.unwrap_err();
        assert_eq!(err.class, ErrorClass::NotFound);
    }

    #[tokio::test]
    async fn primed_failures_fire_once_configured() {
        let client = MockProcessorClient::new();
        client.fail("delete_customer", ProcessorError::other("boom"));

        let err = client.delete_customer("cus_1").await.unwrap_err();

        assert_eq!(err.class, ErrorClass::Other);
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn mutating_calls_are_recorded_in_order() {
        let client = MockProcessorClient::new();
        client.put_subscription(remote("sub_1"));

        client.tag_skip_notification("sub_1").await.unwrap();
        client.cancel_now("sub_1", true).await.unwrap();

        assert_eq!(
            client.calls(),
            vec![
                "tag_skip_notification sub_1".to_string(),
                "cancel_now sub_1 prorate=true".to_string(),
            ]
        );
    }
}

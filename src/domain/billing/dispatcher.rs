//! Webhook dispatcher.
//!
//! Entry point for inbound processor deliveries: verifies authenticity
//! against the region's secret, routes the typed event to its reconciler
//! handler with a total match, and appends the audit entry. Unrecognized
//! event types are acknowledged as success so the processor never retries
//! events this service intentionally does not act on.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::ports::{EventLogEntry, SubscriptionStore};

use super::errors::WebhookError;
use super::event::ProcessorEventKind;
use super::plan::Region;
use super::reconciler::SubscriptionReconciler;
use super::signature::WebhookVerifier;

/// How a delivery was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A handler ran to completion (possibly as a stale no-op).
    Handled,
    /// Unrecognized event type; acknowledged without action.
    Ignored,
}

/// Routes verified processor events into the reconciler.
pub struct WebhookDispatcher {
    verifiers: BTreeMap<Region, WebhookVerifier>,
    reconciler: Arc<SubscriptionReconciler>,
    store: Arc<dyn SubscriptionStore>,
}

impl WebhookDispatcher {
    pub fn new(
        verifiers: BTreeMap<Region, WebhookVerifier>,
        reconciler: Arc<SubscriptionReconciler>,
        store: Arc<dyn SubscriptionStore>,
    ) -> Self {
        Self {
            verifiers,
            reconciler,
            store,
        }
    }

    /// Handles one raw delivery.
    ///
    /// # Errors
    ///
    /// - `InvalidSignature` / `TimestampOutOfRange` - rejected before any
    ///   parsing or ledger access
    /// - `UnconfiguredRegion` - no secret for the targeted region
    /// - `Handler` - a reconciler handler failed; the caller's HTTP status
    ///   drives the processor's redelivery
    pub async fn handle(
        &self,
        payload: &[u8],
        signature_header: &str,
        region: Region,
    ) -> Result<DispatchOutcome, WebhookError> {
        let verifier = self
            .verifiers
            .get(&region)
            .ok_or(WebhookError::UnconfiguredRegion(region))?;
        let event = verifier.verify_and_parse(payload, signature_header)?;

        let log = match &event.kind {
            ProcessorEventKind::CheckoutCompleted(session) => {
                self.reconciler.checkout_completed(session).await?
            }
            ProcessorEventKind::SubscriptionDeleted(remote) => {
                self.reconciler.subscription_deleted(remote).await?
            }
            ProcessorEventKind::SubscriptionUpdated(remote) => {
                self.reconciler.subscription_updated(remote).await?
            }
            ProcessorEventKind::InvoicePaid(invoice) => {
                self.reconciler.invoice_paid(invoice).await?
            }
            ProcessorEventKind::Unknown => {
                tracing::warn!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    %region,
                    "unexpected webhook event type, acknowledging without action"
                );
                return Ok(DispatchOutcome::Ignored);
            }
        };

        match log.user_id {
            // No resolvable user: out-of-order delivery before provisioning
            // or an offer flow audited elsewhere. Dropped by design.
            None => {}
            Some(user_id) => {
                self.store
                    .append_event_log(EventLogEntry::new(user_id, event.raw, log.snapshot))
                    .await
                    .map_err(|e| WebhookError::EventLog(e.to_string()))?;
                tracing::info!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    %user_id,
                    %region,
                    "webhook event handled"
                );
            }
        }

        Ok(DispatchOutcome::Handled)
    }
}

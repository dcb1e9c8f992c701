//! Notification ports - queue boundary and delivery sinks.
//!
//! Enqueueing is synchronous, non-blocking, and infallible from the
//! caller's perspective; the queue implementation logs drops. Delivery
//! happens in a separate worker so sink failures can never affect the
//! transition that requested the notification.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::billing::NotificationIntent;

/// Port the reconciler emits intents into.
pub trait NotificationQueue: Send + Sync {
    /// Hand an intent to the asynchronous delivery worker.
    fn enqueue(&self, intent: NotificationIntent);
}

/// Delivery failure from a sink; logged by the worker, never propagated.
#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct SinkError(pub String);

/// Port for one delivery channel (email, chat alert, ...).
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, intent: &NotificationIntent) -> Result<(), SinkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ports_are_object_safe() {
        fn _queue(_q: &dyn NotificationQueue) {}
        fn _sink(_s: &dyn NotificationSink) {}
    }
}

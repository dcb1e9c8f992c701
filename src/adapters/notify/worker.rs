//! Notification queue and delivery worker.
//!
//! The queue boundary that keeps side effects out of the transactional
//! path: transitions enqueue intents without blocking, a background task
//! drains them, and sink failures are logged where they land instead of
//! propagating back into the transition that asked for them.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::billing::NotificationIntent;
use crate::ports::{NotificationQueue, NotificationSink};

/// Sender half of the notification channel.
pub struct ChannelNotificationQueue {
    tx: mpsc::UnboundedSender<NotificationIntent>,
}

impl NotificationQueue for ChannelNotificationQueue {
    fn enqueue(&self, intent: NotificationIntent) {
        if let Err(err) = self.tx.send(intent) {
            // Worker is gone; the intent is lost by design, not retried.
            tracing::error!(
                intent = err.0.tag(),
                user_id = %err.0.user_id(),
                "notification worker unavailable, dropping intent"
            );
        }
    }
}

/// Creates the queue and the receiver the worker consumes.
pub fn notification_channel() -> (
    ChannelNotificationQueue,
    mpsc::UnboundedReceiver<NotificationIntent>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelNotificationQueue { tx }, rx)
}

/// Spawns the delivery worker.
///
/// The worker runs until every queue handle is dropped, delivering each
/// intent to all sinks concurrently. A failing sink affects neither the
/// other sinks nor the intent's originator.
pub fn spawn_notification_worker(
    mut rx: mpsc::UnboundedReceiver<NotificationIntent>,
    sinks: Vec<Arc<dyn NotificationSink>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(intent) = rx.recv().await {
            let deliveries = sinks.iter().map(|sink| {
                let intent = &intent;
                async move { sink.deliver(intent).await }
            });
            for result in join_all(deliveries).await {
                if let Err(err) = result {
                    tracing::warn!(
                        intent = intent.tag(),
                        user_id = %intent.user_id(),
                        error = %err,
                        "notification delivery failed"
                    );
                }
            }
        }
    })
}

/// Sink that records deliveries in the log stream; stands in for outbound
/// email/chat transports in local wiring.
pub struct TracingSink;

#[async_trait::async_trait]
impl NotificationSink for TracingSink {
    async fn deliver(
        &self,
        intent: &NotificationIntent,
    ) -> Result<(), crate::ports::SinkError> {
        tracing::info!(
            intent = intent.tag(),
            user_id = %intent.user_id(),
            "notification delivered"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserId;
    use crate::ports::SinkError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct CountingSink {
        delivered: AtomicUsize,
        intents: Mutex<Vec<NotificationIntent>>,
    }

    impl CountingSink {
        fn new() -> Self {
            Self {
                delivered: AtomicUsize::new(0),
                intents: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl NotificationSink for CountingSink {
        async fn deliver(&self, intent: &NotificationIntent) -> Result<(), SinkError> {
            self.delivered.fetch_add(1, Ordering::SeqCst);
            self.intents.lock().unwrap().push(intent.clone());
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait::async_trait]
    impl NotificationSink for FailingSink {
        async fn deliver(&self, _intent: &NotificationIntent) -> Result<(), SinkError> {
            Err(SinkError("smtp unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn worker_delivers_each_intent_to_every_sink() {
        let (queue, rx) = notification_channel();
        let sink = Arc::new(CountingSink::new());
        let handle =
            spawn_notification_worker(rx, vec![sink.clone() as Arc<dyn NotificationSink>]);

        queue.enqueue(NotificationIntent::AccountUpgraded {
            user_id: UserId::new(1),
        });
        queue.enqueue(NotificationIntent::SubscriptionEnded {
            user_id: UserId::new(2),
        });
        drop(queue);
        handle.await.unwrap();

        assert_eq!(sink.delivered.load(Ordering::SeqCst), 2);
        let intents = sink.intents.lock().unwrap();
        assert_eq!(intents[0].tag(), "account_upgraded");
        assert_eq!(intents[1].tag(), "subscription_ended");
    }

    #[tokio::test]
    async fn failing_sink_does_not_stop_the_worker_or_other_sinks() {
        let (queue, rx) = notification_channel();
        let counting = Arc::new(CountingSink::new());
        let handle = spawn_notification_worker(
            rx,
            vec![
                Arc::new(FailingSink) as Arc<dyn NotificationSink>,
                counting.clone() as Arc<dyn NotificationSink>,
            ],
        );

        queue.enqueue(NotificationIntent::AccountUpgraded {
            user_id: UserId::new(1),
        });
        queue.enqueue(NotificationIntent::PaymentOnHold {
            user_id: UserId::new(1),
            provider: crate::domain::billing::PaymentProvider::Stripe,
        });
        drop(queue);
        handle.await.unwrap();

        assert_eq!(counting.delivered.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn enqueue_after_worker_shutdown_drops_silently() {
        let (queue, rx) = notification_channel();
        drop(rx);

        // Must not panic or block.
        queue.enqueue(NotificationIntent::AccountUpgraded {
            user_id: UserId::new(1),
        });
    }
}

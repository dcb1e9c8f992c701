//! Recording notification queue for tests.

use std::sync::Mutex;

use crate::domain::billing::NotificationIntent;
use crate::ports::NotificationQueue;

/// Captures every enqueued intent instead of delivering it.
#[derive(Default)]
pub struct RecordingNotificationQueue {
    intents: Mutex<Vec<NotificationIntent>>,
}

impl RecordingNotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intents(&self) -> Vec<NotificationIntent> {
        self.intents.lock().expect("queue lock poisoned").clone()
    }

    pub fn count(&self) -> usize {
        self.intents.lock().expect("queue lock poisoned").len()
    }
}

impl NotificationQueue for RecordingNotificationQueue {
    fn enqueue(&self, intent: NotificationIntent) {
        self.intents.lock().expect("queue lock poisoned").push(intent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserId;

    #[test]
    fn enqueued_intents_are_captured_in_order() {
        let queue = RecordingNotificationQueue::new();
        queue.enqueue(NotificationIntent::AccountUpgraded {
            user_id: UserId::new(1),
        });
        queue.enqueue(NotificationIntent::SubscriptionEnded {
            user_id: UserId::new(2),
        });

        let intents = queue.intents();
        assert_eq!(intents.len(), 2);
        assert_eq!(intents[0].tag(), "account_upgraded");
        assert_eq!(intents[1].tag(), "subscription_ended");
    }
}

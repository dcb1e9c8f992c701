//! Notification adapters - the mpsc queue boundary and delivery worker.

mod worker;

pub use worker::{
    notification_channel, spawn_notification_worker, ChannelNotificationQueue, TracingSink,
};

//! In-memory adapters.
//!
//! Deterministic, lock-backed implementations of the ports for tests and
//! local wiring. Production deployments bind their own store and
//! collaborator services.

mod directory;
mod notify;
mod processor;
mod store;

pub use directory::{InMemoryStorageUsage, InMemoryUserDirectory, RecordingOfferApplier};
pub use notify::RecordingNotificationQueue;
pub use processor::MockProcessorClient;
pub use store::InMemorySubscriptionStore;

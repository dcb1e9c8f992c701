//! Adapters - Implementations of port interfaces.
//!
//! - `processor` - reqwest client for the payment processor REST API
//! - `http` - axum surface for webhooks and billing endpoints
//! - `notify` - mpsc notification queue and delivery worker
//! - `memory` - in-memory implementations for tests and local wiring

pub mod http;
pub mod memory;
pub mod notify;
pub mod processor;

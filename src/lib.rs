//! Skyvault billing - subscription ledger reconciliation against an
//! external payment processor.
//!
//! Webhook deliveries arrive late, duplicated, or before the rows they
//! reference exist; this crate keeps the per-user subscription ledger
//! converging to the processor's true state without double-charging,
//! double-notifying, or regressing newer state.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

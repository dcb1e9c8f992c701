//! Processor adapters.
//!
//! The reqwest-backed client for the processor's REST API and its wire
//! types. The per-region registry lives in `ports` next to the client
//! contract.

mod client;
mod types;

pub use client::{HttpProcessorClient, ProcessorAccountConfig};

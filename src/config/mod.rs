//! Application configuration module.
//!
//! Type-safe configuration loaded from environment variables via the
//! `config` and `dotenvy` crates. Variables carry the `SKYVAULT` prefix
//! with `__` separating nested values.
//!
//! # Example
//!
//! ```no_run
//! use skyvault_billing::config::AppConfig;
//!
//! let config = AppConfig::load().expect("failed to load configuration");
//! config.validate().expect("invalid configuration");
//! ```

mod error;
mod payment;
mod server;

pub use error::{ConfigError, ValidationError};
pub use payment::{PaymentConfig, ProcessorAccount};
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP server (host, port, environment).
    #[serde(default)]
    pub server: ServerConfig,

    /// Payment processor accounts and catalog wiring.
    pub payment: PaymentConfig,
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads a `.env` file when present, then environment variables:
    ///
    /// - `SKYVAULT__SERVER__PORT=8080` -> `server.port`
    /// - `SKYVAULT__PAYMENT__DEFAULT_REGION=eu` -> `payment.default_region`
    /// - `SKYVAULT__PAYMENT__ACCOUNTS__EU__API_KEY=sk_...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when required variables are missing or values
    /// fail to parse.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("SKYVAULT")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration sections.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.payment.validate()?;
        Ok(())
    }
}

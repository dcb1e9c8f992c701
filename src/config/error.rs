//! Configuration error types.

use thiserror::Error;

use crate::domain::billing::Region;

/// Errors while loading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration load error: {0}")]
    Load(#[from] config::ConfigError),
}

/// Errors from semantic validation of loaded configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("missing required configuration: {0}")]
    MissingRequired(&'static str),

    #[error("api key for region {0} must start with sk_")]
    InvalidApiKey(Region),

    #[error("webhook secret for region {0} must start with whsec_")]
    InvalidWebhookSecret(Region),

    #[error("default region {0} has no configured account")]
    UnknownDefaultRegion(Region),

    #[error("server port must be non-zero")]
    InvalidPort,
}

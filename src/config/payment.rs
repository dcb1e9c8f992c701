//! Payment processor configuration.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::domain::billing::Region;

use super::error::ValidationError;

/// Credentials for one regional processor account.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorAccount {
    /// Secret API key (sk_live_... or sk_test_...).
    pub api_key: String,

    /// Webhook signing secret (whsec_...).
    pub webhook_secret: String,
}

impl ProcessorAccount {
    /// Whether the account points at the processor's test mode.
    pub fn is_test_mode(&self) -> bool {
        self.api_key.starts_with("sk_test_")
    }
}

/// Payment configuration across regional accounts.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Region used for customers with no processor affinity yet.
    pub default_region: Region,

    /// Per-region account credentials.
    pub accounts: BTreeMap<Region, ProcessorAccount>,

    /// Path appended to the redirect root after successful checkout.
    #[serde(default = "default_success_path")]
    pub checkout_success_path: String,

    /// Path appended to the redirect root after cancelled checkout.
    #[serde(default = "default_cancel_path")]
    pub checkout_cancel_path: String,

    /// Plan catalog YAML file; the built-in catalog is used when unset.
    #[serde(default)]
    pub catalog_path: Option<String>,
}

fn default_success_path() -> String {
    "/checkout/success".to_string()
}

fn default_cancel_path() -> String {
    "/checkout/cancel".to_string()
}

impl PaymentConfig {
    /// Validate credentials and region wiring.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.accounts.is_empty() {
            return Err(ValidationError::MissingRequired("payment.accounts"));
        }
        if !self.accounts.contains_key(&self.default_region) {
            return Err(ValidationError::UnknownDefaultRegion(self.default_region));
        }
        for (region, account) in &self.accounts {
            if !account.api_key.starts_with("sk_") {
                return Err(ValidationError::InvalidApiKey(*region));
            }
            if !account.webhook_secret.starts_with("whsec_") {
                return Err(ValidationError::InvalidWebhookSecret(*region));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(api_key: &str, webhook_secret: &str) -> ProcessorAccount {
        ProcessorAccount {
            api_key: api_key.to_string(),
            webhook_secret: webhook_secret.to_string(),
        }
    }

    fn valid_config() -> PaymentConfig {
        let mut accounts = BTreeMap::new();
        accounts.insert(Region::Eu, account("sk_test_eu", "whsec_eu"));
        accounts.insert(Region::Us, account("sk_test_us", "whsec_us"));
        PaymentConfig {
            default_region: Region::Eu,
            accounts,
            checkout_success_path: default_success_path(),
            checkout_cancel_path: default_cancel_path(),
            catalog_path: None,
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn empty_accounts_fail() {
        let mut config = valid_config();
        config.accounts.clear();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::MissingRequired(_))
        ));
    }

    #[test]
    fn default_region_must_have_an_account() {
        let mut config = valid_config();
        config.accounts.remove(&Region::Eu);
        assert!(matches!(
            config.validate(),
            Err(ValidationError::UnknownDefaultRegion(Region::Eu))
        ));
    }

    #[test]
    fn api_key_prefix_is_enforced() {
        let mut config = valid_config();
        config
            .accounts
            .insert(Region::Us, account("pk_test_us", "whsec_us"));
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidApiKey(Region::Us))
        ));
    }

    #[test]
    fn webhook_secret_prefix_is_enforced() {
        let mut config = valid_config();
        config
            .accounts
            .insert(Region::Us, account("sk_test_us", "secret_us"));
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidWebhookSecret(Region::Us))
        ));
    }

    #[test]
    fn test_mode_is_detected_from_the_key() {
        assert!(account("sk_test_x", "whsec_x").is_test_mode());
        assert!(!account("sk_live_x", "whsec_x").is_test_mode());
    }
}

//! OfferApplier port - anonymous-offer redemption.
//!
//! Checkout sessions with no client reference belong to offer flows keyed
//! by email; the offer service provisions them and owns their audit trail.

use async_trait::async_trait;

use crate::domain::billing::BillingError;

/// Port for applying a purchased offer to an account by email.
#[async_trait]
pub trait OfferApplier: Send + Sync {
    async fn apply_offer(&self, email: &str, price_id: &str) -> Result<(), BillingError>;
}

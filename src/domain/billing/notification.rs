//! Notification intents.
//!
//! The reconciler never talks to email or chat directly; it emits intents
//! into a queue and a separate worker executes them. Delivery failures are
//! isolated from transition outcomes by this boundary.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::UserId;

use super::subscription::PaymentProvider;

/// A side-channel alert requested by a subscription transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationIntent {
    /// User moved off the free plan; thank-you mail.
    AccountUpgraded { user_id: UserId },

    /// Internal sale alert for a new paid subscription.
    NewSaleAlert {
        user_id: UserId,
        provider: PaymentProvider,
        /// Human-readable charged amount, e.g. "€2.99".
        amount: String,
    },

    /// Paid subscription ended at the processor.
    SubscriptionEnded { user_id: UserId },

    /// Renewal payment is past due; account on hold.
    PaymentOnHold {
        user_id: UserId,
        provider: PaymentProvider,
    },
}

impl NotificationIntent {
    /// User the intent concerns.
    pub fn user_id(&self) -> UserId {
        match self {
            NotificationIntent::AccountUpgraded { user_id }
            | NotificationIntent::NewSaleAlert { user_id, .. }
            | NotificationIntent::SubscriptionEnded { user_id }
            | NotificationIntent::PaymentOnHold { user_id, .. } => *user_id,
        }
    }

    /// Short tag for logs.
    pub fn tag(&self) -> &'static str {
        match self {
            NotificationIntent::AccountUpgraded { .. } => "account_upgraded",
            NotificationIntent::NewSaleAlert { .. } => "new_sale_alert",
            NotificationIntent::SubscriptionEnded { .. } => "subscription_ended",
            NotificationIntent::PaymentOnHold { .. } => "payment_on_hold",
        }
    }
}

/// Formats a processor-reported amount in the currency's minor unit.
///
/// Falls back to the uppercased currency code when no symbol is mapped.
pub fn format_amount(currency: &str, amount_minor: i64) -> String {
    let major = amount_minor as f64 / 100.0;
    match currency.to_ascii_lowercase().as_str() {
        "eur" => format!("€{:.2}", major),
        "usd" => format!("${:.2}", major),
        "gbp" => format!("£{:.2}", major),
        other => format!("{} {:.2}", other.to_ascii_uppercase(), major),
    }
}

//! Billing error taxonomy.
//!
//! Stale-event detection is deliberately absent here: a stale event is a
//! successful no-op outcome, not an error.

use axum::http::StatusCode;
use thiserror::Error;

use super::plan::Region;

/// Normalized classification of processor API failures.
///
/// Produced by the processor-client adapter so no caller ever inspects
/// transport-specific error shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Card-decline-class failure; surfaced to the user as a payment issue.
    CardDeclined,
    /// The remote resource does not exist (or no longer exists).
    NotFound,
    /// The processor rejected the request as invalid.
    InvalidRequest,
    /// Anything else: network, auth, server-side failures.
    Other,
}

/// A failure reported by the external payment processor.
#[derive(Debug, Clone, Error)]
#[error("processor error ({class:?}): {message}")]
pub struct ProcessorError {
    pub class: ErrorClass,
    pub message: String,
}

impl ProcessorError {
    pub fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
        }
    }

    pub fn card_declined(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::CardDeclined, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::NotFound, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::InvalidRequest, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Other, message)
    }

    /// Whether the remote resource is already gone or the request was
    /// rejected outright; flows that treat "already resolved" as success
    /// branch on this.
    pub fn is_already_resolved(&self) -> bool {
        matches!(self.class, ErrorClass::NotFound | ErrorClass::InvalidRequest)
    }
}

/// Errors surfaced by billing operations.
#[derive(Debug, Error)]
pub enum BillingError {
    /// The caller requested an illegal state transition.
    #[error("bad request")]
    BadRequest,

    /// Unknown plan, customer, or session.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Valid request blocked by the downgrade business rule.
    #[error("current usage exceeds the target plan's quota")]
    CannotDowngrade,

    /// A live subscription pins its payment provider.
    #[error("cannot switch payment provider while subscribed")]
    CannotSwitchProvider,

    /// No processor client configured for a region. Configuration error,
    /// not runtime data.
    #[error("no processor client configured for region {0}")]
    UnconfiguredRegion(Region),

    /// The external payment API failed; propagated, never retried here.
    #[error(transparent)]
    Processor(#[from] ProcessorError),

    /// Remote mutation succeeded but local persistence failed (or vice
    /// versa); logged at high severity for manual reconciliation.
    #[error("partial failure: {0}")]
    PartialFailure(String),

    /// Ledger storage failure.
    #[error("store error: {0}")]
    Store(String),
}

impl BillingError {
    /// HTTP status for the user-facing entry points.
    pub fn status_code(&self) -> StatusCode {
        match self {
            BillingError::BadRequest | BillingError::CannotSwitchProvider => {
                StatusCode::BAD_REQUEST
            }
            BillingError::NotFound(_) => StatusCode::NOT_FOUND,
            BillingError::CannotDowngrade => StatusCode::CONFLICT,
            BillingError::Processor(_) => StatusCode::BAD_GATEWAY,
            BillingError::UnconfiguredRegion(_)
            | BillingError::PartialFailure(_)
            | BillingError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Errors raised while accepting a webhook delivery.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature verification failed; rejected before any parsing.
    #[error("invalid signature")]
    InvalidSignature,

    /// Signed timestamp outside the replay window.
    #[error("signature timestamp out of range")]
    TimestampOutOfRange,

    /// Signed timestamp in the future beyond clock-skew tolerance.
    #[error("invalid signature timestamp")]
    InvalidTimestamp,

    /// Malformed signature header or payload.
    #[error("parse error: {0}")]
    Parse(String),

    /// No webhook secret configured for the region the delivery targeted.
    #[error("no webhook secret configured for region {0}")]
    UnconfiguredRegion(Region),

    /// A reconciliation handler failed; reflected to the processor so its
    /// redelivery policy drives the retry.
    #[error(transparent)]
    Handler(#[from] BillingError),

    /// Audit-log persistence failed after a successful transition.
    #[error("event log error: {0}")]
    EventLog(String),
}

impl WebhookError {
    /// HTTP status returned to the processor.
    ///
    /// 2xx acknowledges (no retry), 4xx rejects permanently, 5xx invites
    /// redelivery.
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::InvalidSignature | WebhookError::TimestampOutOfRange => {
                StatusCode::UNAUTHORIZED
            }
            WebhookError::InvalidTimestamp | WebhookError::Parse(_) => StatusCode::BAD_REQUEST,
            WebhookError::UnconfiguredRegion(_)
            | WebhookError::Handler(_)
            | WebhookError::EventLog(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the processor should retry delivering this event.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WebhookError::Handler(_) | WebhookError::EventLog(_)
        )
    }
}

//! Delivery error types.

use thiserror::Error;

/// Attachment validation failures. Always client errors (HTTP 400); the
/// reason code identifies the specific rule.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AttachmentError {
    /// Extension not in the configured allow-list.
    #[error("attachment {name:?} has a disallowed type")]
    DisallowedType { name: String },

    /// Cumulative size across all parts exceeds the configured maximum.
    #[error("attachments exceed the {limit}-byte limit")]
    TooLarge { limit: usize },

    /// A part arrived without a usable name or content.
    #[error("attachment could not be read")]
    Unreadable,
}

impl AttachmentError {
    /// The error string reported in the JSON response body.
    #[must_use]
    pub const fn reason_code(&self) -> &'static str {
        match self {
            Self::DisallowedType { .. } => "attachment_type",
            Self::TooLarge { .. } => "attachment_too_large",
            Self::Unreadable => "attachment_error",
        }
    }
}

/// Failure of a single transport attempt.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Terminal delivery failure: every configured transport was tried and
/// none succeeded. Carries the per-transport details for the audit trail;
/// the caller only ever sees the final outcome.
#[derive(Debug, Error)]
#[error("all transports failed: {summary}")]
pub struct DeliveryFailure {
    pub summary: String,
    pub attempts: Vec<crate::mailer::DeliveryAttempt>,
}

//! Request-level error taxonomy.
//!
//! Every failure a request can hit is converted into a JSON response
//! here; nothing propagates past the handler. Client errors are 400 and
//! name the rule that rejected the field, abuse rejections carry the
//! status of their [`Reason`], configuration and transport failures are
//! the only 500s.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use formgate_common::ConfigError;
use formgate_delivery::{AttachmentError, DeliveryFailure};
use formgate_guard::Reason;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RequestError {
    /// Rejected by the anti-abuse pipeline or field validation in it.
    #[error("submission rejected: {}", .0.code())]
    Rejected(Reason),

    /// The message field was missing or blank.
    #[error("message is empty")]
    EmptyMessage,

    /// An attachment failed validation.
    #[error(transparent)]
    Attachment(#[from] AttachmentError),

    /// Operator misconfiguration surfaced at request time.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Every transport failed.
    #[error("delivery failed: {}", .0.summary)]
    Delivery(DeliveryFailure),
}

impl RequestError {
    /// The HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Rejected(reason) => {
                StatusCode::from_u16(reason.status()).unwrap_or(StatusCode::BAD_REQUEST)
            }
            Self::EmptyMessage | Self::Attachment(_) => StatusCode::BAD_REQUEST,
            Self::Config(_) | Self::Delivery(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The error string reported in the JSON response body and the audit
    /// log outcome field.
    #[must_use]
    pub fn code(&self) -> String {
        match self {
            Self::Rejected(reason) => reason.code().to_string(),
            Self::EmptyMessage => "empty_message".to_string(),
            Self::Attachment(error) => error.reason_code().to_string(),
            Self::Config(error) => error.reason_code().to_string(),
            Self::Delivery(failure) => failure.summary.clone(),
        }
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let body = json!({ "ok": false, "error": self.code() });
        (self.status(), Json(body)).into_response()
    }
}

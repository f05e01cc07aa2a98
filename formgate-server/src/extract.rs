//! Turning the raw HTTP request into a [`Submission`].
//!
//! Both supported encodings land in the same value object: form fields
//! by name, any part carrying a filename as a raw attachment. Unknown
//! fields are ignored. An unparseable urlencoded body yields an empty
//! submission and is rejected by field validation downstream; a
//! multipart part that cannot be read is an attachment error.

use std::net::SocketAddr;

use axum::extract::multipart::MultipartError;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::{ORIGIN, REFERER};
use axum::http::{HeaderMap, StatusCode};
use formgate_common::Submission;
use formgate_common::submission::RawPart;
use formgate_delivery::AttachmentError;
use formgate_guard::RequestMeta;

use crate::error::RequestError;

/// Field names the form contract reserves. The honeypot and CAPTCHA
/// token fields are configuration-dependent and passed in.
const FIELD_NAME: &str = "name";
const FIELD_EMAIL: &str = "email";
const FIELD_MESSAGE: &str = "message";
const FIELD_TS: &str = "ts";

/// Slack added on top of the attachment budget for the form fields
/// themselves and multipart framing.
const BODY_OVERHEAD_BYTES: usize = 64 * 1024;

/// Names of the configuration-dependent form fields.
#[derive(Debug, Clone, Copy)]
pub struct FieldNames<'a> {
    pub honeypot: &'a str,
    pub captcha_token: Option<&'static str>,
}

/// Collect the request-level facts the guard needs.
#[must_use]
pub fn request_meta(headers: &HeaderMap, peer: Option<SocketAddr>) -> RequestMeta {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    // First hop of X-Forwarded-For is the client as the reverse proxy
    // saw it. Direct connections fall back to the socket peer address so
    // each client keeps its own rate key.
    let client = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map_or_else(
            || peer.map_or_else(|| "unknown".to_string(), |addr| addr.ip().to_string()),
            str::to_string,
        );

    RequestMeta {
        client,
        host: header("host"),
        origin: headers
            .get(ORIGIN)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        referer: headers
            .get(REFERER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    }
}

/// Parse the request body into a [`Submission`].
///
/// # Errors
///
/// Returns an attachment error when a multipart part cannot be read, or
/// an attachment-too-large error when the body exceeds its size cap.
pub async fn submission_from_request(
    request: Request,
    fields: FieldNames<'_>,
    max_attachment_bytes: usize,
) -> Result<Submission, RequestError> {
    let is_multipart = request
        .headers()
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));

    if is_multipart {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|_| RequestError::Attachment(AttachmentError::Unreadable))?;
        from_multipart(multipart, fields, max_attachment_bytes).await
    } else {
        let max_body = max_attachment_bytes + BODY_OVERHEAD_BYTES;
        let bytes = axum::body::to_bytes(request.into_body(), max_body)
            .await
            .unwrap_or_default();
        Ok(from_urlencoded(&bytes, fields))
    }
}

/// A read failure caused by the body size limit is a size rejection, not
/// a generic unreadable part.
fn attachment_error(error: &MultipartError, limit: usize) -> RequestError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        RequestError::Attachment(AttachmentError::TooLarge { limit })
    } else {
        RequestError::Attachment(AttachmentError::Unreadable)
    }
}

fn from_urlencoded(bytes: &[u8], fields: FieldNames<'_>) -> Submission {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(bytes).unwrap_or_default();

    let mut submission = Submission::default();
    for (key, value) in pairs {
        apply_field(&mut submission, &key, value, fields);
    }
    submission
}

async fn from_multipart(
    mut multipart: Multipart,
    fields: FieldNames<'_>,
    max_attachment_bytes: usize,
) -> Result<Submission, RequestError> {
    let mut submission = Submission::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| attachment_error(&e, max_attachment_bytes))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if let Some(file_name) = field.file_name() {
            let file_name = file_name.to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| attachment_error(&e, max_attachment_bytes))?;
            submission.attachments.push(RawPart {
                file_name,
                bytes: bytes.to_vec(),
            });
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| attachment_error(&e, max_attachment_bytes))?;
            apply_field(&mut submission, &name, value, fields);
        }
    }

    Ok(submission)
}

fn apply_field(submission: &mut Submission, key: &str, value: String, fields: FieldNames<'_>) {
    if key == fields.honeypot {
        submission.honeypot = Some(value);
    } else if fields.captcha_token == Some(key) {
        submission.captcha_token = Some(value);
    } else {
        match key {
            FIELD_NAME => submission.name = Some(value),
            FIELD_EMAIL => submission.email = value,
            FIELD_MESSAGE => submission.message = value,
            FIELD_TS => submission.client_ts = value.trim().parse().ok(),
            _ => {}
        }
    }
}

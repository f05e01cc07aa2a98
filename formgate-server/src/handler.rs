//! The submission handler.
//!
//! One request, one pass through the pipeline, one audit line. Honeypot
//! trips share the success response path so the decoy is
//! indistinguishable on the wire from a real acceptance.

use std::net::SocketAddr;

use axum::Json;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use formgate_common::ConfigError;
use formgate_common::audit::{AuditEvent, AuditRecord};
use formgate_delivery::{attachments, composer};
use formgate_guard::{RequestMeta, Verdict};
use serde_json::json;

use crate::AppState;
use crate::error::RequestError;
use crate::extract::{self, FieldNames};

/// POST handler for the submission endpoint.
pub async fn submit(State(state): State<AppState>, request: Request) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let meta = extract::request_meta(request.headers(), peer);

    match handle(&state, &meta, request).await {
        Ok(record) => {
            state.audit.append(&record);
            accepted()
        }
        Err((error, record)) => {
            state.audit.append(&record);
            error.into_response()
        }
    }
}

/// Decoy and real acceptance share this response.
fn accepted() -> Response {
    (StatusCode::OK, Json(json!({ "ok": true }))).into_response()
}

fn with_meta(mut record: AuditRecord, meta: &RequestMeta) -> AuditRecord {
    record.origin.clone_from(&meta.origin);
    record.referer.clone_from(&meta.referer);
    record
}

async fn handle(
    state: &AppState,
    meta: &RequestMeta,
    request: Request,
) -> Result<AuditRecord, (RequestError, AuditRecord)> {
    let reject = |error: RequestError, event: AuditEvent| {
        let record = with_meta(
            AuditRecord::new(event, &meta.client, error.code()),
            meta,
        );
        (error, record)
    };

    if state.config.identity.to.iter().all(|r| r.trim().is_empty()) {
        return Err(reject(
            RequestError::Config(ConfigError::MissingRecipient),
            AuditEvent::ConfigError,
        ));
    }

    let fields = FieldNames {
        honeypot: state.guard.honeypot_field(),
        captcha_token: state.config.anti_abuse.captcha.provider.token_field(),
    };
    let submission = extract::submission_from_request(
        request,
        fields,
        state.config.anti_abuse.max_attachment_bytes,
    )
    .await
    .map_err(|error| reject(error, AuditEvent::ClientRejected))?;

    let snapshot = state.audit.snapshot(&submission);
    let reject_with_fields = |error: RequestError, event: AuditEvent| {
        let mut record = with_meta(
            AuditRecord::new(event, &meta.client, error.code()),
            meta,
        );
        record.fields = snapshot.clone();
        (error, record)
    };

    match state.guard.inspect(meta, &submission).await {
        Verdict::Proceed => {}
        Verdict::Decoy => {
            tracing::info!(client = %meta.client, "honeypot tripped, sending decoy");
            let mut record = with_meta(
                AuditRecord::new(AuditEvent::HoneypotTripped, &meta.client, "ok"),
                meta,
            );
            record.fields = snapshot.clone();
            return Ok(record);
        }
        Verdict::Reject(reason) => {
            let event = if reason.is_abuse() {
                AuditEvent::AbuseRejected
            } else {
                AuditEvent::ClientRejected
            };
            return Err(reject_with_fields(RequestError::Rejected(reason), event));
        }
    }

    if submission.message.trim().is_empty() {
        return Err(reject_with_fields(
            RequestError::EmptyMessage,
            AuditEvent::ClientRejected,
        ));
    }

    let attachments = attachments::process(
        &submission.attachments,
        &state.config.anti_abuse.allowed_attachment_extensions,
        state.config.anti_abuse.max_attachment_bytes,
    )
    .map_err(|error| {
        reject_with_fields(RequestError::Attachment(error), AuditEvent::ClientRejected)
    })?;

    let message = composer::compose(
        &state.config.identity,
        state.config.anti_abuse.max_body_len,
        &submission,
        &meta.client,
        chrono::Utc::now(),
        attachments,
    );

    match state.mailer.deliver(&message).await {
        Ok(transport) => {
            let mut record = with_meta(
                AuditRecord::new(AuditEvent::SubmissionAccepted, &meta.client, "ok"),
                meta,
            );
            record.transport = Some(transport.to_string());
            record.fields = snapshot.clone();
            Ok(record)
        }
        Err(failure) => Err(reject_with_fields(
            RequestError::Delivery(failure),
            AuditEvent::DeliveryFailed,
        )),
    }
}

/// 405 for anything but POST on the submission path.
pub async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "ok": false, "error": "method_not_allowed" })),
    )
        .into_response()
}

/// Liveness probe. If this responds, the process is up.
pub async fn healthz() -> Response {
    (StatusCode::OK, Json(json!({ "ok": true }))).into_response()
}

//! Append-only audit logging for submission outcomes.
//!
//! Every request produces exactly one JSON object on its own line in the
//! configured audit file, whatever path it took through the processor. The
//! record carries a redacted snapshot of the submitted fields; attachment
//! content and CAPTCHA tokens are never written. Writes are best-effort: a
//! full disk must not fail the request, so errors are logged and swallowed.
//!
//! Honeypot trips are the one place caller-visible and audit-visible truth
//! diverge on purpose: the caller sees a success, the log records the trip.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::{Value, json};

use crate::config::LoggingConfig;
use crate::submission::Submission;

/// Classification of a submission outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEvent {
    /// Delivered successfully over one of the transports.
    SubmissionAccepted,
    /// Rejected for a malformed or disallowed field (HTTP 400).
    ClientRejected,
    /// Rejected by the anti-abuse pipeline (HTTP 403/429). Logged
    /// distinctly from ordinary client errors for later pattern analysis.
    AbuseRejected,
    /// The honeypot field was filled; the caller was shown a decoy success.
    HoneypotTripped,
    /// Both transports failed.
    DeliveryFailed,
    /// Operator misconfiguration surfaced at request time.
    ConfigError,
}

/// One immutable audit record, serialized as a single JSON line.
#[derive(Debug, Serialize)]
pub struct AuditRecord {
    pub timestamp: String,
    pub event: AuditEvent,
    pub client: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
    /// Reason code for rejections, `"ok"` for successes and decoys.
    pub outcome: String,
    /// Transport that carried the message, for delivered submissions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport: Option<String>,
    /// Redacted snapshot of the submitted fields.
    pub fields: Value,
}

impl AuditRecord {
    /// Build a record stamped with the current UTC time.
    #[must_use]
    pub fn new(event: AuditEvent, client: impl Into<String>, outcome: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            event,
            client: client.into(),
            origin: None,
            referer: None,
            outcome: outcome.into(),
            transport: None,
            fields: Value::Null,
        }
    }
}

/// The audit log writer.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
    redact_fields: Vec<String>,
}

impl AuditLog {
    #[must_use]
    pub fn new(config: &LoggingConfig) -> Self {
        Self {
            path: config.audit_log_path.clone(),
            redact_fields: config.redact_fields.clone(),
        }
    }

    /// Produce the redacted field snapshot for a submission.
    ///
    /// Attachments appear by name and size only; the CAPTCHA token is
    /// reduced to a presence flag.
    #[must_use]
    pub fn snapshot(&self, submission: &Submission) -> Value {
        let attachments: Vec<Value> = submission
            .attachments
            .iter()
            .map(|part| {
                json!({
                    "name": part.file_name,
                    "size": part.bytes.len(),
                })
            })
            .collect();

        let mut snapshot = json!({
            "name": submission.name,
            "email": submission.email,
            "message": submission.message,
            "ts": submission.client_ts,
            "captcha_token_present": submission.captcha_token.is_some(),
            "attachments": attachments,
        });

        if let Value::Object(map) = &mut snapshot {
            for field in &self.redact_fields {
                if let Some(value) = map.get_mut(field) {
                    *value = Value::String("[REDACTED]".to_string());
                }
            }
        }

        snapshot
    }

    /// Append one record to the log.
    ///
    /// Failures are logged at WARN and otherwise ignored; audit writes must
    /// never fail the request they describe.
    pub fn append(&self, record: &AuditRecord) {
        if let Err(error) = self.try_append(record) {
            tracing::warn!(path = %self.path.display(), %error, "audit log write failed");
        }
    }

    fn try_append(&self, record: &AuditRecord) -> std::io::Result<()> {
        let line = serde_json::to_string(record)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")
    }
}

//! Outbound message composition.
//!
//! The composer is deterministic: given the same configuration, submission,
//! client address, and timestamp, it produces the same subject, body, and
//! recipient set. Sanitization strips non-printable characters and silently
//! truncates over-long bodies; truncation is not an error.

use chrono::{DateTime, Utc};
use formgate_common::Submission;
use formgate_common::config::IdentityConfig;

use crate::attachments::Attachment;

/// The normalized message handed to the transports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub sender_name: String,
    pub sender_email: String,
    /// The submitter, so replies go to them rather than the site.
    pub reply_to: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub text_body: String,
    pub attachments: Vec<Attachment>,
}

impl OutboundMessage {
    /// Every envelope recipient: To, then Cc, then Bcc.
    #[must_use]
    pub fn all_recipients(&self) -> Vec<String> {
        self.to
            .iter()
            .chain(self.cc.iter())
            .chain(self.bcc.iter())
            .cloned()
            .collect()
    }
}

/// Strip characters that have no business in a plain-text message while
/// keeping line and tab structure.
fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|c| *c == '\n' || *c == '\t' || !c.is_control())
        .collect()
}

/// Truncate to at most `max_chars` characters, on a character boundary.
fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Build the outbound message for one validated submission.
#[must_use]
pub fn compose(
    identity: &IdentityConfig,
    max_body_len: usize,
    submission: &Submission,
    client: &str,
    timestamp: DateTime<Utc>,
    attachments: Vec<Attachment>,
) -> OutboundMessage {
    let subject = if identity.subject_prefix.is_empty() {
        format!("New message from {}", submission.sender_display())
    } else {
        format!(
            "[{}] New message from {}",
            identity.subject_prefix,
            submission.sender_display()
        )
    };

    let message = truncate(&sanitize(&submission.message), max_body_len);

    let mut body = String::new();
    if !identity.site_name.is_empty() {
        body.push_str(&format!("Site: {}\n", identity.site_name));
    }
    body.push_str(&format!(
        "From: {} <{}>\n",
        sanitize(submission.sender_display()),
        submission.email
    ));
    body.push_str(&format!("Client: {client}\n"));
    body.push_str(&format!("Date: {}\n", timestamp.to_rfc3339()));
    body.push('\n');
    body.push_str(&message);

    OutboundMessage {
        sender_name: identity.sender_name.clone(),
        sender_email: identity.sender_email.clone(),
        reply_to: submission.email.clone(),
        to: identity.to.clone(),
        cc: identity.cc.clone(),
        bcc: identity.bcc.clone(),
        subject,
        text_body: body,
        attachments,
    }
}

//! SMTP submission transport.
//!
//! Formats the outbound message as an RFC 5322 text and drives one
//! authenticated submission over [`formgate_smtp`]. One connection, one
//! transaction, no retries.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use formgate_smtp::{Credentials, Envelope, SmtpTransaction, TcpDialog};

use crate::composer::OutboundMessage;
use crate::error::TransportError;
use crate::mailer::Transport;

pub struct SmtpTransport {
    host: String,
    port: u16,
    helo_domain: String,
    credentials: Credentials,
    command_timeout: Duration,
}

impl SmtpTransport {
    #[must_use]
    pub const fn new(
        host: String,
        port: u16,
        helo_domain: String,
        credentials: Credentials,
        command_timeout: Duration,
    ) -> Self {
        Self {
            host,
            port,
            helo_domain,
            credentials,
            command_timeout,
        }
    }

    /// Render the message with submission headers. Lines use `\n`; the
    /// transaction layer converts to CRLF and applies dot-stuffing.
    fn format_message(message: &OutboundMessage) -> String {
        let mut out = String::new();

        out.push_str(&format!(
            "From: {} <{}>\n",
            message.sender_name, message.sender_email
        ));
        out.push_str(&format!("To: {}\n", message.to.join(", ")));
        if !message.cc.is_empty() {
            out.push_str(&format!("Cc: {}\n", message.cc.join(", ")));
        }
        out.push_str(&format!("Reply-To: {}\n", message.reply_to));
        out.push_str(&format!("Subject: {}\n", message.subject));
        out.push_str(&format!("Date: {}\n", Utc::now().to_rfc2822()));
        out.push_str("MIME-Version: 1.0\n");
        out.push_str("Content-Type: text/plain; charset=utf-8\n");
        out.push('\n');
        out.push_str(&message.text_body);

        out
    }
}

#[async_trait]
impl Transport for SmtpTransport {
    fn name(&self) -> &'static str {
        "smtp"
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        let dialog = TcpDialog::connect(&self.host, self.port)
            .await
            .map_err(|e| TransportError(format!("smtp connect failed: {e}")))?;

        let transaction = SmtpTransaction::new(
            dialog,
            self.helo_domain.clone(),
            self.command_timeout,
        );

        let recipients = message.all_recipients();
        let text = Self::format_message(message);
        let envelope = Envelope {
            sender: &message.sender_email,
            recipients: &recipients,
            message: &text,
        };

        transaction
            .run(&self.credentials, &envelope)
            .await
            .map_err(|e| TransportError(format!("smtp submission failed: {e}")))
    }
}

//! The SMTP submission state machine.
//!
//! One transaction is one pass through the protocol milestones:
//!
//! ```text
//! Connected → AfterEhloFirst → AfterStartTls → AfterEhloSecond
//!           → Authenticated → MailFromAccepted → RcptAccepted(each)
//!           → DataAccepted → MessageSent → Closed
//! ```
//!
//! Every transition consumes exactly one server reply and requires a
//! specific status code; anything else aborts the transaction with the
//! failing stage named. There is no retry inside the transaction and no
//! plaintext fallback: STARTTLS must succeed before AUTH PLAIN is sent.

use std::fmt;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::dialog::Dialog;
use crate::error::{Result, SmtpError};
use crate::response::Reply;

/// Protocol milestone a reply is consumed at. Used in error reporting so a
/// failed delivery names exactly where the conversation broke down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Banner,
    EhloFirst,
    StartTls,
    EhloSecond,
    Auth,
    MailFrom,
    RcptTo,
    Data,
    Message,
    Quit,
}

impl Stage {
    /// The status code the server must answer this stage with.
    #[must_use]
    pub const fn expected_code(self) -> u16 {
        match self {
            Self::Banner | Self::StartTls => 220,
            Self::EhloFirst | Self::EhloSecond | Self::MailFrom | Self::RcptTo | Self::Message => {
                250
            }
            Self::Auth => 235,
            Self::Data => 354,
            Self::Quit => 221,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Banner => "banner",
            Self::EhloFirst => "first EHLO",
            Self::StartTls => "STARTTLS",
            Self::EhloSecond => "EHLO after STARTTLS",
            Self::Auth => "AUTH",
            Self::MailFrom => "MAIL FROM",
            Self::RcptTo => "RCPT TO",
            Self::Data => "DATA",
            Self::Message => "message body",
            Self::Quit => "QUIT",
        };
        f.write_str(name)
    }
}

/// A single PLAIN credential pair.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// The AUTH PLAIN initial response: base64 of `\0user\0pass`.
    fn plain_token(&self) -> String {
        let raw = format!("\0{}\0{}", self.username, self.password);
        BASE64.encode(raw.as_bytes())
    }
}

/// What the transaction submits: envelope addresses plus the already
/// formatted message text.
#[derive(Debug, Clone)]
pub struct Envelope<'a> {
    pub sender: &'a str,
    pub recipients: &'a [String],
    /// Full message (headers and body), lines separated by `\n` or `\r\n`.
    pub message: &'a str,
}

/// Drives one SMTP submission over a [`Dialog`].
pub struct SmtpTransaction<D: Dialog> {
    dialog: D,
    helo_domain: String,
    command_timeout: Duration,
}

impl<D: Dialog> SmtpTransaction<D> {
    #[must_use]
    pub const fn new(dialog: D, helo_domain: String, command_timeout: Duration) -> Self {
        Self {
            dialog,
            helo_domain,
            command_timeout,
        }
    }

    /// Read one reply for `stage` and require its expected status code.
    async fn expect(&mut self, stage: Stage) -> Result<Reply> {
        let reply = tokio::time::timeout(self.command_timeout, self.dialog.read_reply())
            .await
            .map_err(|_| SmtpError::Timeout { stage })??;

        if reply.code == stage.expected_code() {
            Ok(reply)
        } else {
            Err(SmtpError::UnexpectedReply {
                stage,
                code: reply.code,
                message: reply.message(),
            })
        }
    }

    /// Send `command` and consume the reply for `stage`.
    async fn step(&mut self, stage: Stage, command: &str) -> Result<Reply> {
        self.dialog.send_line(command).await?;
        self.expect(stage).await
    }

    /// Run the full transaction.
    ///
    /// On success the message has been accepted by the server and the
    /// connection closed with QUIT (QUIT failures after acceptance are
    /// logged, not reported).
    pub async fn run(mut self, credentials: &Credentials, envelope: &Envelope<'_>) -> Result<()> {
        self.expect(Stage::Banner).await?;

        let ehlo = format!("EHLO {}", self.helo_domain);
        self.step(Stage::EhloFirst, &ehlo).await?;

        self.step(Stage::StartTls, "STARTTLS").await?;
        self.dialog.upgrade_tls().await?;
        self.step(Stage::EhloSecond, &ehlo).await?;

        let auth = format!("AUTH PLAIN {}", credentials.plain_token());
        self.step(Stage::Auth, &auth).await?;

        let mail_from = format!("MAIL FROM:<{}>", envelope.sender);
        self.step(Stage::MailFrom, &mail_from).await?;

        for recipient in envelope.recipients {
            let rcpt_to = format!("RCPT TO:<{recipient}>");
            self.step(Stage::RcptTo, &rcpt_to).await?;
        }

        self.step(Stage::Data, "DATA").await?;
        self.send_message(envelope.message).await?;
        self.expect(Stage::Message).await?;

        // The message is accepted at this point; a broken QUIT does not
        // undo that.
        if let Err(error) = self.step(Stage::Quit, "QUIT").await {
            tracing::debug!(%error, "QUIT after successful submission failed");
        }

        Ok(())
    }

    /// Send the message body line by line, dot-stuffed per RFC 5321, then
    /// the end-of-data marker.
    async fn send_message(&mut self, message: &str) -> Result<()> {
        for line in message.lines() {
            if line.starts_with('.') {
                self.dialog.send_line(&format!(".{line}")).await?;
            } else {
                self.dialog.send_line(line).await?;
            }
        }
        self.dialog.send_line(".").await
    }
}

//! The per-request submission value object.
//!
//! A [`Submission`] is constructed from the raw form fields, inspected by
//! the anti-abuse guard, consumed by the message composer, and discarded
//! once the response has been written. Nothing here outlives the request.

/// One raw file part as it arrived in the form, before validation.
#[derive(Debug, Clone, Default)]
pub struct RawPart {
    /// Client-supplied file name. Empty when the part had none.
    pub file_name: String,
    /// File content as received.
    pub bytes: Vec<u8>,
}

impl RawPart {
    /// The lowercased extension of the file name, if it has one.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
    }
}

/// A single untrusted form submission.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    /// Sender display name. Optional.
    pub name: Option<String>,
    /// Sender email address, as submitted. Required by the form contract;
    /// extraction leaves it empty when absent so validation can reject it.
    pub email: String,
    /// The message text. Required by the form contract.
    pub message: String,
    /// Client-supplied Unix timestamp of when the form was rendered.
    pub client_ts: Option<i64>,
    /// Value of the honeypot field. Any non-empty value marks a bot.
    pub honeypot: Option<String>,
    /// CAPTCHA token, under the active provider's field name.
    pub captcha_token: Option<String>,
    /// Raw file parts, not yet validated.
    pub attachments: Vec<RawPart>,
}

impl Submission {
    /// The name used in the composed subject line: the display name when
    /// present and non-empty, otherwise the email address.
    #[must_use]
    pub fn sender_display(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.email,
        }
    }

    /// Whether the honeypot field was filled in.
    #[must_use]
    pub fn honeypot_tripped(&self) -> bool {
        self.honeypot.as_deref().is_some_and(|v| !v.trim().is_empty())
    }

    /// The domain part of the sender address, lowercased.
    #[must_use]
    pub fn email_domain(&self) -> Option<String> {
        self.email
            .rsplit_once('@')
            .map(|(_, domain)| domain.to_ascii_lowercase())
    }
}

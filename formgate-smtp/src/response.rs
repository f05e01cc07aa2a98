//! SMTP reply parsing.

use crate::error::{Result, SmtpError};

/// A complete SMTP reply, possibly spanning multiple lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// The three-digit status code.
    pub code: u16,
    /// Message lines, continuation markers stripped.
    pub lines: Vec<String>,
}

impl Reply {
    #[must_use]
    pub const fn new(code: u16, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// The reply text joined into one string.
    #[must_use]
    pub fn message(&self) -> String {
        self.lines.join("\n")
    }

    /// Parse one line: three-digit code, then either a space (final line)
    /// or a dash (continuation).
    fn parse_line(line: &str) -> Result<(u16, bool, &str)> {
        if line.len() < 3 {
            return Err(SmtpError::Parse(format!("reply line too short: {line:?}")));
        }

        let code = line[..3]
            .parse::<u16>()
            .map_err(|_| SmtpError::Parse(format!("invalid status code in {line:?}")))?;

        let (is_last, text) = match line.as_bytes().get(3) {
            None => (true, ""),
            Some(b' ') => (true, line.get(4..).unwrap_or("")),
            Some(b'-') => (false, line.get(4..).unwrap_or("")),
            Some(_) => {
                return Err(SmtpError::Parse(format!(
                    "invalid separator in reply line {line:?}"
                )));
            }
        };

        Ok((code, is_last, text))
    }

    /// Try to parse one complete reply from the front of `buffer`.
    ///
    /// Returns the reply and the number of bytes consumed, or `None` when
    /// the buffer does not yet hold a full reply.
    pub fn parse(buffer: &[u8]) -> Result<Option<(Self, usize)>> {
        let text = std::str::from_utf8(buffer)
            .map_err(|e| SmtpError::Parse(format!("reply is not valid UTF-8: {e}")))?;

        let mut lines = Vec::new();
        let mut consumed = 0;
        let mut code = None;

        loop {
            let rest = &text[consumed..];
            let Some(end) = rest.find('\n') else {
                return Ok(None); // Incomplete line, need more data.
            };
            let line = rest[..end].trim_end_matches('\r');
            consumed += end + 1;

            let (line_code, is_last, message) = Self::parse_line(line)?;
            match code {
                None => code = Some(line_code),
                Some(expected) if expected != line_code => {
                    return Err(SmtpError::Parse(format!(
                        "status code changed mid-reply: {expected} then {line_code}"
                    )));
                }
                Some(_) => {}
            }
            lines.push(message.to_string());

            if is_last {
                let code = code.unwrap_or(line_code);
                return Ok(Some((Self::new(code, lines), consumed)));
            }
        }
    }
}

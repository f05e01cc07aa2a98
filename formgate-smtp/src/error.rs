//! Error types for the SMTP client.

use thiserror::Error;

use crate::transaction::Stage;

/// Errors that can occur while driving an SMTP submission.
#[derive(Debug, Error)]
pub enum SmtpError {
    /// IO error during network operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before the transaction completed.
    #[error("connection closed unexpectedly")]
    ConnectionClosed,

    /// A server reply could not be parsed.
    #[error("failed to parse SMTP reply: {0}")]
    Parse(String),

    /// TLS negotiation or certificate handling failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The server answered a stage with an unexpected status code.
    #[error("unexpected reply at {stage}: {code} {message}")]
    UnexpectedReply {
        stage: Stage,
        code: u16,
        message: String,
    },

    /// A stage did not complete within its command timeout.
    #[error("timed out at {stage}")]
    Timeout { stage: Stage },
}

/// Specialized `Result` type for SMTP client operations.
pub type Result<T> = std::result::Result<T, SmtpError>;

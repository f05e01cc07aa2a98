//! The dual-transport mailer.
//!
//! Transports are tried strictly in order; the first success wins and the
//! remaining transports are never touched. A transport failure is not
//! retried within that transport: one attempt each, and both failing is
//! the terminal outcome the caller sees.

use std::time::Duration;

use async_trait::async_trait;
use formgate_common::config::{IdentityConfig, TransportConfig, TransportKind};
use formgate_smtp::Credentials;
use serde::Serialize;

use crate::composer::OutboundMessage;
use crate::error::{DeliveryFailure, TransportError};
use crate::transport::{ApiTransport, SmtpTransport};

/// One delivery mechanism. Implementations make exactly one attempt per
/// `send` call and report failure immediately rather than retrying.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short transport name, recorded in the audit log (`"api"`, `"smtp"`).
    fn name(&self) -> &'static str;

    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError>;
}

/// Record of one transport try.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryAttempt {
    pub transport: &'static str,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Tries each configured transport in order.
pub struct Mailer {
    transports: Vec<Box<dyn Transport>>,
}

impl Mailer {
    /// Build a mailer over an ordered transport list. The list encodes the
    /// configured preference: `[api, smtp]` for API-first with fallback,
    /// `[smtp]` when the API is skipped by configuration.
    #[must_use]
    pub fn new(transports: Vec<Box<dyn Transport>>) -> Self {
        Self { transports }
    }

    /// Build the transport chain the configuration asks for.
    ///
    /// `preferred = "api"` yields the API transport with SMTP as fallback;
    /// `preferred = "smtp"` yields SMTP alone and the API is never tried.
    #[must_use]
    pub fn from_config(transport: &TransportConfig, identity: &IdentityConfig) -> Self {
        let timeout = Duration::from_secs(transport.timeout_secs);

        let smtp = Box::new(SmtpTransport::new(
            transport.smtp_host.clone(),
            transport.smtp_port,
            helo_domain(&identity.sender_email),
            Credentials {
                username: transport.smtp_username.clone(),
                password: transport.smtp_password.clone(),
            },
            timeout,
        ));

        let transports: Vec<Box<dyn Transport>> = match transport.preferred {
            TransportKind::Api => {
                let api = Box::new(ApiTransport::new(
                    &transport.api_base_url,
                    transport.api_token.clone(),
                    transport.message_stream.clone(),
                    timeout,
                ));
                vec![api, smtp]
            }
            TransportKind::Smtp => vec![smtp],
        };

        Self::new(transports)
    }

    /// Deliver `message`, returning the name of the transport that carried
    /// it, or the collected attempt records when every transport failed.
    pub async fn deliver(
        &self,
        message: &OutboundMessage,
    ) -> Result<&'static str, DeliveryFailure> {
        let mut attempts = Vec::with_capacity(self.transports.len());

        for transport in &self.transports {
            match transport.send(message).await {
                Ok(()) => {
                    tracing::info!(transport = transport.name(), "message delivered");
                    return Ok(transport.name());
                }
                Err(error) => {
                    tracing::warn!(
                        transport = transport.name(),
                        %error,
                        "transport attempt failed"
                    );
                    attempts.push(DeliveryAttempt {
                        transport: transport.name(),
                        success: false,
                        error: Some(error.0),
                    });
                }
            }
        }

        let summary = attempts
            .iter()
            .map(|a| {
                format!(
                    "{}: {}",
                    a.transport,
                    a.error.as_deref().unwrap_or("unknown")
                )
            })
            .collect::<Vec<_>>()
            .join("; ");

        Err(DeliveryFailure { summary, attempts })
    }
}

/// EHLO identity. Uses the sender address domain when it has one.
fn helo_domain(sender_email: &str) -> String {
    sender_email
        .rsplit_once('@')
        .map_or_else(|| "localhost".to_string(), |(_, domain)| domain.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct StubTransport {
        name: &'static str,
        succeed: bool,
        calls: Arc<AtomicUsize>,
    }

    impl StubTransport {
        fn boxed(name: &'static str, succeed: bool) -> (Box<Self>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let stub = Box::new(Self {
                name,
                succeed,
                calls: Arc::clone(&calls),
            });
            (stub, calls)
        }
    }

    #[async_trait]
    impl Transport for StubTransport {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn send(&self, _message: &OutboundMessage) -> Result<(), TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                Ok(())
            } else {
                Err(TransportError(format!("{} refused", self.name)))
            }
        }
    }

    fn message() -> OutboundMessage {
        OutboundMessage {
            sender_name: "Forms".to_string(),
            sender_email: "noreply@example.com".to_string(),
            reply_to: "user@example.com".to_string(),
            to: vec!["inbox@example.com".to_string()],
            cc: Vec::new(),
            bcc: Vec::new(),
            subject: "subject".to_string(),
            text_body: "body".to_string(),
            attachments: Vec::new(),
        }
    }

    #[tokio::test]
    async fn first_success_wins_and_fallback_is_untouched() {
        let (api, api_calls) = StubTransport::boxed("api", true);
        let (smtp, smtp_calls) = StubTransport::boxed("smtp", true);

        let mailer = Mailer::new(vec![api, smtp]);
        let transport = mailer.deliver(&message()).await.unwrap();

        assert_eq!(transport, "api");
        assert_eq!(api_calls.load(Ordering::SeqCst), 1);
        assert_eq!(smtp_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn api_failure_falls_back_to_smtp_exactly_once() {
        let (api, api_calls) = StubTransport::boxed("api", false);
        let (smtp, smtp_calls) = StubTransport::boxed("smtp", true);

        let mailer = Mailer::new(vec![api, smtp]);
        let transport = mailer.deliver(&message()).await.unwrap();

        assert_eq!(transport, "smtp");
        assert_eq!(api_calls.load(Ordering::SeqCst), 1);
        assert_eq!(smtp_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn both_failing_is_terminal_with_attempt_records() {
        let (api, _) = StubTransport::boxed("api", false);
        let (smtp, _) = StubTransport::boxed("smtp", false);
        let mailer = Mailer::new(vec![api, smtp]);
        let failure = mailer.deliver(&message()).await.unwrap_err();

        assert_eq!(failure.attempts.len(), 2);
        assert_eq!(failure.attempts[0].transport, "api");
        assert_eq!(failure.attempts[1].transport, "smtp");
        assert!(failure.summary.contains("api refused"));
        assert!(failure.summary.contains("smtp refused"));
    }

    #[test]
    fn helo_domain_falls_back_to_localhost() {
        assert_eq!(helo_domain("noreply@example.com"), "example.com");
        assert_eq!(helo_domain("not-an-address"), "localhost");
    }

    #[tokio::test]
    async fn smtp_only_configuration_never_touches_api() {
        let (smtp, _) = StubTransport::boxed("smtp", true);
        let mailer = Mailer::new(vec![smtp]);
        let transport = mailer.deliver(&message()).await.unwrap();
        assert_eq!(transport, "smtp");
    }
}

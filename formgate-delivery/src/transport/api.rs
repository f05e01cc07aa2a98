//! HTTP email API transport.
//!
//! Posts the message as JSON to a Postmark-compatible `/email` endpoint,
//! authenticating with a server token header. Any non-2xx status or
//! network-level failure is one failed attempt; the transport never
//! retries on its own.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;

use crate::composer::OutboundMessage;
use crate::error::TransportError;
use crate::mailer::Transport;

const TOKEN_HEADER: &str = "X-Postmark-Server-Token";

pub struct ApiTransport {
    client: reqwest::Client,
    endpoint: String,
    token: String,
    message_stream: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ApiPayload {
    from: String,
    to: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    cc: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    bcc: String,
    subject: String,
    text_body: String,
    reply_to: String,
    message_stream: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<ApiAttachment>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ApiAttachment {
    name: String,
    content: String,
    content_type: String,
}

impl ApiTransport {
    #[must_use]
    pub fn new(base_url: &str, token: String, message_stream: String, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            endpoint: format!("{}/email", base_url.trim_end_matches('/')),
            token,
            message_stream,
        }
    }

    fn payload(&self, message: &OutboundMessage) -> ApiPayload {
        ApiPayload {
            from: format!("{} <{}>", message.sender_name, message.sender_email),
            to: message.to.join(", "),
            cc: message.cc.join(", "),
            bcc: message.bcc.join(", "),
            subject: message.subject.clone(),
            text_body: message.text_body.clone(),
            reply_to: message.reply_to.clone(),
            message_stream: self.message_stream.clone(),
            attachments: message
                .attachments
                .iter()
                .map(|a| ApiAttachment {
                    name: a.name.clone(),
                    content: BASE64.encode(&a.bytes),
                    content_type: a.content_type.to_string(),
                })
                .collect(),
        }
    }
}

#[async_trait]
impl Transport for ApiTransport {
    fn name(&self) -> &'static str {
        "api"
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(TOKEN_HEADER, &self.token)
            .json(&self.payload(message))
            .send()
            .await
            .map_err(|e| TransportError(format!("api request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(TransportError(format!(
                "api returned {status}: {}",
                body.chars().take(200).collect::<String>()
            )))
        }
    }
}

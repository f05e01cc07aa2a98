//! Server-side CAPTCHA verification.
//!
//! All three supported providers (Cloudflare Turnstile, hCaptcha, Google
//! reCAPTCHA) share the same siteverify contract: a form POST of the
//! secret, the client token, and the client IP, answered with a JSON body
//! whose `success` flag is authoritative.
//!
//! Policy: the verifier fails closed. A provider that is unreachable, slow
//! past the configured timeout, or returning garbage counts as a failed
//! verification, not a bypass.

use std::time::Duration;

use serde::Deserialize;

use formgate_common::config::{CaptchaConfig, CaptchaProvider};

/// Outcome of one verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptchaOutcome {
    /// No provider configured; the check does not apply.
    NotConfigured,
    /// The provider confirmed the token.
    Verified,
    /// Token rejected, missing, or the provider could not be consulted.
    Failed,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

/// Verifies CAPTCHA tokens against the configured provider.
#[derive(Debug, Clone)]
pub struct CaptchaVerifier {
    provider: CaptchaProvider,
    secret_key: String,
    verify_url: Option<String>,
    http: reqwest::Client,
}

impl CaptchaVerifier {
    /// Build a verifier from configuration.
    ///
    /// Falls back to an unconfigured verifier if the HTTP client cannot be
    /// constructed, which never happens with these builder options.
    #[must_use]
    pub fn new(config: &CaptchaConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.verify_timeout_secs))
            .build()
            .unwrap_or_default();

        let verify_url = config.verify_url_override.clone().or_else(|| {
            config
                .provider
                .verify_url()
                .map(std::string::ToString::to_string)
        });

        Self {
            provider: config.provider,
            secret_key: config.secret_key.clone(),
            verify_url,
            http,
        }
    }

    /// Verify `token` for the client at `client_ip`.
    ///
    /// A missing token while a provider is active is a failure: a satisfied
    /// CAPTCHA can never be assumed. The check is skipped only when the
    /// provider is `none`.
    pub async fn verify(&self, token: Option<&str>, client_ip: &str) -> CaptchaOutcome {
        if self.provider == CaptchaProvider::None {
            return CaptchaOutcome::NotConfigured;
        }

        let Some(token) = token.filter(|t| !t.is_empty()) else {
            tracing::info!(provider = ?self.provider, "captcha token missing from submission");
            return CaptchaOutcome::Failed;
        };

        let Some(url) = self.verify_url.as_deref() else {
            return CaptchaOutcome::Failed;
        };

        let params = [
            ("secret", self.secret_key.as_str()),
            ("response", token),
            ("remoteip", client_ip),
        ];

        let response = match self.http.post(url).form(&params).send().await {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(provider = ?self.provider, %error, "captcha provider unreachable, failing closed");
                return CaptchaOutcome::Failed;
            }
        };

        match response.json::<VerifyResponse>().await {
            Ok(verdict) if verdict.success => CaptchaOutcome::Verified,
            Ok(verdict) => {
                tracing::info!(
                    provider = ?self.provider,
                    error_codes = ?verdict.error_codes,
                    "captcha verification rejected"
                );
                CaptchaOutcome::Failed
            }
            Err(error) => {
                tracing::warn!(provider = ?self.provider, %error, "captcha provider returned unparseable body");
                CaptchaOutcome::Failed
            }
        }
    }
}

//! Anti-abuse guard for formgate.
//!
//! Given the request metadata and the parsed submission, the guard applies
//! the same-origin check, the honeypot, the minimum-elapsed-time check,
//! the per-client rate limit, email syntax and disposable-domain checks,
//! and finally CAPTCHA verification, in that order, short-circuiting at
//! the first rejection.

pub mod captcha;
pub mod checks;
pub mod disposable;
pub mod rate;

use std::sync::Arc;

use formgate_common::Submission;
use formgate_common::config::AntiAbuseConfig;

pub use captcha::{CaptchaOutcome, CaptchaVerifier};
pub use checks::{Reason, RequestMeta, Verdict};
pub use rate::{MemoryRateStore, RateCounterStore};

/// The assembled anti-abuse pipeline.
pub struct Guard {
    config: AntiAbuseConfig,
    store: Arc<dyn RateCounterStore>,
    captcha: CaptchaVerifier,
}

impl Guard {
    #[must_use]
    pub fn new(config: AntiAbuseConfig, store: Arc<dyn RateCounterStore>) -> Self {
        let captcha = CaptchaVerifier::new(&config.captcha);
        Self {
            config,
            store,
            captcha,
        }
    }

    /// The configured honeypot field name, needed at extraction time.
    #[must_use]
    pub fn honeypot_field(&self) -> &str {
        &self.config.honeypot_field
    }

    /// Run every check in order, stopping at the first non-proceed verdict.
    ///
    /// Each check runs only when every earlier one proceeded, so a request
    /// terminated by the origin, honeypot, or timing check never touches
    /// the rate counter.
    pub async fn inspect(&self, meta: &RequestMeta, submission: &Submission) -> Verdict {
        let now = chrono::Utc::now().timestamp();

        let synchronous: [&dyn Fn() -> Verdict; 5] = [
            &|| checks::check_origin(meta),
            &|| checks::check_honeypot(submission),
            &|| checks::check_timing(&self.config, submission, now),
            &|| checks::check_rate(&self.config, self.store.as_ref(), &meta.client),
            &|| checks::check_email(&self.config, submission),
        ];
        for check in synchronous {
            let verdict = check();
            if verdict != Verdict::Proceed {
                return verdict;
            }
        }

        match self
            .captcha
            .verify(submission.captcha_token.as_deref(), &meta.client)
            .await
        {
            CaptchaOutcome::NotConfigured | CaptchaOutcome::Verified => Verdict::Proceed,
            CaptchaOutcome::Failed => Verdict::Reject(Reason::CaptchaFailed),
        }
    }
}

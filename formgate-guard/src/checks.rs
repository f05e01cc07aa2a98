//! The ordered anti-abuse check pipeline.
//!
//! Each check is a named function returning a [`Verdict`]; the runner in
//! [`Guard::inspect`](crate::Guard::inspect) applies them in a fixed order
//! and stops at the first one that does not return [`Verdict::Proceed`].
//! Keeping the checks as separate functions keeps the ordering and
//! short-circuit semantics explicit and independently testable.

use email_address::EmailAddress;
use formgate_common::Submission;
use formgate_common::config::AntiAbuseConfig;

use crate::disposable;
use crate::rate::RateCounterStore;

/// Why a submission was rejected. Each reason maps to one wire-level
/// error code and HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    Forbidden,
    TooFast,
    RateLimited,
    InvalidEmail,
    DisposableEmailBlocked,
    CaptchaFailed,
}

impl Reason {
    /// The error string reported in the JSON response body.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Forbidden => "forbidden",
            Self::TooFast => "too_fast",
            Self::RateLimited => "rate_limited",
            Self::InvalidEmail => "invalid_email",
            Self::DisposableEmailBlocked => "disposable_email_blocked",
            Self::CaptchaFailed => "captcha_failed",
        }
    }

    /// The HTTP status the rejection is reported with.
    #[must_use]
    pub const fn status(self) -> u16 {
        match self {
            Self::Forbidden | Self::CaptchaFailed => 403,
            Self::TooFast | Self::RateLimited => 429,
            Self::InvalidEmail | Self::DisposableEmailBlocked => 400,
        }
    }

    /// Whether the rejection came from the abuse pipeline rather than
    /// ordinary field validation. Audit logging keeps the two apart.
    #[must_use]
    pub const fn is_abuse(self) -> bool {
        !matches!(self, Self::InvalidEmail | Self::DisposableEmailBlocked)
    }
}

/// Outcome of one check, or of the whole pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Move on to the next check (or to delivery).
    Proceed,
    /// Reject with the given reason.
    Reject(Reason),
    /// Honeypot trip: answer with a decoy success and send nothing.
    Decoy,
}

/// Request-level facts the checks need: who is calling and what the
/// reverse proxy saw.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    /// Client address as forwarded by the reverse proxy.
    pub client: String,
    /// Value of the `Host` header.
    pub host: Option<String>,
    /// Value of the `Origin` header, when the browser sent one.
    pub origin: Option<String>,
    /// Value of the `Referer` header.
    pub referer: Option<String>,
}

/// Extract the host part of a URL or host[:port] string, lowercased.
fn host_of(value: &str) -> Option<String> {
    let rest = value
        .split_once("://")
        .map_or(value, |(_, rest)| rest);
    let host = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or(rest);
    // Strip a trailing :port. IPv6 literals keep their brackets and this
    // split leaves them intact when no port is present.
    let host = host.rsplit_once(':').map_or(host, |(before, after)| {
        if after.chars().all(|c| c.is_ascii_digit()) {
            before
        } else {
            host
        }
    });

    if host.is_empty() {
        None
    } else {
        Some(host.to_ascii_lowercase())
    }
}

/// Same-origin check: when an `Origin` header is present its host must
/// equal the request host, otherwise the `Referer` host must. Absence of
/// both is permitted; that fail-open is deliberate so non-browser clients
/// keep working.
#[must_use]
pub fn check_origin(meta: &RequestMeta) -> Verdict {
    let Some(request_host) = meta.host.as_deref().and_then(host_of) else {
        // No Host header at all; nothing to compare against.
        return Verdict::Proceed;
    };

    let claimed = meta
        .origin
        .as_deref()
        .and_then(host_of)
        .or_else(|| meta.referer.as_deref().and_then(host_of));

    match claimed {
        Some(host) if host == request_host => Verdict::Proceed,
        Some(_) => Verdict::Reject(Reason::Forbidden),
        None => Verdict::Proceed,
    }
}

/// Honeypot check: any non-empty value in the hidden field marks a bot.
/// The caller is answered as if the submission succeeded so the abuser
/// learns nothing; the audit log records the trip.
#[must_use]
pub fn check_honeypot(submission: &Submission) -> Verdict {
    if submission.honeypot_tripped() {
        Verdict::Decoy
    } else {
        Verdict::Proceed
    }
}

/// Timing check: a form submitted less than `min_submit_secs` after it was
/// rendered is bot-fast. An elapsed time exactly equal to the minimum
/// passes; only strictly-less rejects. A missing timestamp skips the check
/// rather than counting as abuse.
#[must_use]
pub fn check_timing(config: &AntiAbuseConfig, submission: &Submission, now: i64) -> Verdict {
    match submission.client_ts {
        Some(ts) if now.saturating_sub(ts) < config.min_submit_secs => {
            Verdict::Reject(Reason::TooFast)
        }
        _ => Verdict::Proceed,
    }
}

/// Rate check: one increment against the shared store, rejected once the
/// running count within the current window exceeds the configured maximum.
#[must_use]
pub fn check_rate(config: &AntiAbuseConfig, store: &dyn RateCounterStore, client: &str) -> Verdict {
    let count = store.increment(client);
    if count > config.rate_max {
        tracing::info!(client, count, max = config.rate_max, "rate limit exceeded");
        Verdict::Reject(Reason::RateLimited)
    } else {
        Verdict::Proceed
    }
}

/// Email check: standard address syntax, then the disposable-domain
/// blocklist when enabled.
#[must_use]
pub fn check_email(config: &AntiAbuseConfig, submission: &Submission) -> Verdict {
    if !EmailAddress::is_valid(&submission.email) {
        return Verdict::Reject(Reason::InvalidEmail);
    }

    if config.block_disposable
        && submission
            .email_domain()
            .is_some_and(|domain| disposable::is_disposable(&domain))
    {
        return Verdict::Reject(Reason::DisposableEmailBlocked);
    }

    Verdict::Proceed
}

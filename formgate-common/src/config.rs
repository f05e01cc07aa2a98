//! Strongly-typed process configuration.
//!
//! The configuration is parsed once at startup from a TOML file and never
//! mutated afterwards. Every optional value has a typed default so a minimal
//! file only needs the identity section; `validate` fails fast on anything
//! the processor cannot run without (most importantly an empty recipient
//! list, which would otherwise fail every delivery).

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

/// Top-level configuration, one instance per process.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub anti_abuse: AntiAbuseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load and validate the configuration from `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Find the configuration file using the following precedence:
    /// 1. `FORMGATE_CONFIG` environment variable
    /// 2. `./formgate.toml` (current working directory)
    /// 3. `/etc/formgate/formgate.toml` (system-wide config)
    pub fn find_file() -> Result<PathBuf, ConfigError> {
        if let Ok(env_path) = std::env::var("FORMGATE_CONFIG") {
            let path = PathBuf::from(env_path);
            if path.exists() {
                return Ok(path);
            }
            return Err(ConfigError::NotFound {
                tried: format!("  - FORMGATE_CONFIG={}", path.display()),
            });
        }

        let default_paths = [
            PathBuf::from("./formgate.toml"),
            PathBuf::from("/etc/formgate/formgate.toml"),
        ];

        for path in &default_paths {
            if path.exists() {
                return Ok(path.clone());
            }
        }

        let tried = default_paths
            .iter()
            .map(|p| format!("  - {}", p.display()))
            .collect::<Vec<_>>()
            .join("\n");

        Err(ConfigError::NotFound {
            tried: format!("  - FORMGATE_CONFIG environment variable\n{tried}"),
        })
    }

    /// Fail fast on configuration the processor cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.identity.to.iter().all(|r| r.trim().is_empty()) {
            return Err(ConfigError::MissingRecipient);
        }

        if self.identity.sender_email.trim().is_empty() {
            return Err(ConfigError::MissingValue("identity.sender_email"));
        }

        match self.transport.preferred {
            TransportKind::Api if self.transport.api_token.is_empty() => {
                return Err(ConfigError::MissingValue("transport.api_token"));
            }
            TransportKind::Api | TransportKind::Smtp => {
                if self.transport.smtp_host.is_empty() {
                    return Err(ConfigError::MissingValue("transport.smtp_host"));
                }
            }
        }

        if self.anti_abuse.captcha.provider != CaptchaProvider::None
            && self.anti_abuse.captcha.secret_key.is_empty()
        {
            return Err(ConfigError::MissingValue("anti_abuse.captcha.secret_key"));
        }

        Ok(())
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the submission endpoint binds to. The reverse proxy in front
    /// routes one well-known path here, so loopback is the common value.
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Path the form POSTs to.
    #[serde(default = "default_submit_path")]
    pub submit_path: String,

    /// Per-request wall clock ceiling, covering both transport attempts.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_listen_address() -> String {
    "127.0.0.1:8725".to_string()
}

fn default_submit_path() -> String {
    "/submit".to_string()
}

const fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            submit_path: default_submit_path(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Who the outbound message claims to come from, and where it goes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentityConfig {
    /// Human-readable site name, used in the message body.
    #[serde(default)]
    pub site_name: String,

    /// Display name for the sender of the outbound message.
    #[serde(default)]
    pub sender_name: String,

    /// Envelope/From address for the outbound message.
    #[serde(default)]
    pub sender_email: String,

    /// Prefix prepended to the subject line, in square brackets.
    #[serde(default)]
    pub subject_prefix: String,

    /// Primary recipients. At least one non-empty entry is required.
    #[serde(default)]
    pub to: Vec<String>,

    /// Carbon-copy recipients.
    #[serde(default)]
    pub cc: Vec<String>,

    /// Blind-carbon-copy recipients.
    #[serde(default)]
    pub bcc: Vec<String>,
}

/// Which delivery mechanism to try first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// HTTP JSON API first, SMTP as fallback.
    #[default]
    Api,
    /// SMTP only; the API attempt is skipped entirely.
    Smtp,
}

/// Transport endpoints and credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    #[serde(default)]
    pub preferred: TransportKind,

    /// Base URL of the email API provider.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Server token sent with every API request.
    #[serde(default)]
    pub api_token: String,

    /// Message stream tag forwarded to the API provider.
    #[serde(default = "default_message_stream")]
    pub message_stream: String,

    /// SMTP submission host.
    #[serde(default)]
    pub smtp_host: String,

    /// SMTP submission port.
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    /// AUTH PLAIN username.
    #[serde(default)]
    pub smtp_username: String,

    /// AUTH PLAIN password.
    #[serde(default)]
    pub smtp_password: String,

    /// Per-attempt timeout, applied to the API request as a whole and to
    /// each SMTP command individually.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_base_url() -> String {
    "https://api.postmarkapp.com".to_string()
}

fn default_message_stream() -> String {
    "outbound".to_string()
}

const fn default_smtp_port() -> u16 {
    587
}

const fn default_timeout_secs() -> u64 {
    15
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            preferred: TransportKind::default(),
            api_base_url: default_api_base_url(),
            api_token: String::new(),
            message_stream: default_message_stream(),
            smtp_host: String::new(),
            smtp_port: default_smtp_port(),
            smtp_username: String::new(),
            smtp_password: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Thresholds for the anti-abuse pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct AntiAbuseConfig {
    /// Name of the hidden honeypot form field.
    #[serde(default = "default_honeypot_field")]
    pub honeypot_field: String,

    /// Minimum seconds between form render and submission.
    #[serde(default = "default_min_submit_secs")]
    pub min_submit_secs: i64,

    /// Length of the tumbling rate window, per client address.
    #[serde(default = "default_rate_window_secs")]
    pub rate_window_secs: u64,

    /// Maximum submissions per client address within one window.
    #[serde(default = "default_rate_max")]
    pub rate_max: u32,

    /// Reject sender addresses on known disposable-mail domains.
    #[serde(default = "default_true")]
    pub block_disposable: bool,

    /// Maximum message body length in characters; longer bodies are
    /// silently truncated, not rejected.
    #[serde(default = "default_max_body_len")]
    pub max_body_len: usize,

    /// File extensions accepted as attachments.
    #[serde(default = "default_allowed_extensions")]
    pub allowed_attachment_extensions: Vec<String>,

    /// Cumulative attachment size ceiling in bytes.
    #[serde(default = "default_max_attachment_bytes")]
    pub max_attachment_bytes: usize,

    #[serde(default)]
    pub captcha: CaptchaConfig,
}

fn default_honeypot_field() -> String {
    "website".to_string()
}

const fn default_min_submit_secs() -> i64 {
    3
}

const fn default_rate_window_secs() -> u64 {
    3600
}

const fn default_rate_max() -> u32 {
    5
}

const fn default_true() -> bool {
    true
}

const fn default_max_body_len() -> usize {
    10_000
}

fn default_allowed_extensions() -> Vec<String> {
    ["pdf", "png", "jpg", "jpeg", "gif", "txt"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

const fn default_max_attachment_bytes() -> usize {
    5 * 1024 * 1024
}

impl Default for AntiAbuseConfig {
    fn default() -> Self {
        Self {
            honeypot_field: default_honeypot_field(),
            min_submit_secs: default_min_submit_secs(),
            rate_window_secs: default_rate_window_secs(),
            rate_max: default_rate_max(),
            block_disposable: default_true(),
            max_body_len: default_max_body_len(),
            allowed_attachment_extensions: default_allowed_extensions(),
            max_attachment_bytes: default_max_attachment_bytes(),
            captcha: CaptchaConfig::default(),
        }
    }
}

/// Third-party CAPTCHA providers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptchaProvider {
    #[default]
    None,
    Turnstile,
    Hcaptcha,
    Recaptcha,
}

impl CaptchaProvider {
    /// The form field the provider's client-side widget submits its token
    /// under.
    #[must_use]
    pub const fn token_field(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Turnstile => Some("cf-turnstile-response"),
            Self::Hcaptcha => Some("h-captcha-response"),
            Self::Recaptcha => Some("g-recaptcha-response"),
        }
    }

    /// The provider's server-side verification endpoint.
    #[must_use]
    pub const fn verify_url(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Turnstile => Some("https://challenges.cloudflare.com/turnstile/v0/siteverify"),
            Self::Hcaptcha => Some("https://api.hcaptcha.com/siteverify"),
            Self::Recaptcha => Some("https://www.google.com/recaptcha/api/siteverify"),
        }
    }
}

/// CAPTCHA verification settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CaptchaConfig {
    #[serde(default)]
    pub provider: CaptchaProvider,

    /// Public site key, echoed to front-ends; unused server-side.
    #[serde(default)]
    pub site_key: String,

    /// Secret key sent with every verification request.
    #[serde(default)]
    pub secret_key: String,

    /// Timeout for one verification round trip.
    #[serde(default = "default_captcha_timeout_secs")]
    pub verify_timeout_secs: u64,

    /// Override of the provider verification URL. Intended for tests.
    #[serde(default)]
    pub verify_url_override: Option<String>,
}

const fn default_captcha_timeout_secs() -> u64 {
    5
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            provider: CaptchaProvider::default(),
            site_key: String::new(),
            secret_key: String::new(),
            verify_timeout_secs: default_captcha_timeout_secs(),
            verify_url_override: None,
        }
    }
}

/// Audit log destination and redaction.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Path the audit log is appended to.
    #[serde(default = "default_audit_log_path")]
    pub audit_log_path: PathBuf,

    /// Submission field names whose values are replaced with `[REDACTED]`
    /// in audit records. Attachment content and CAPTCHA tokens are never
    /// logged regardless of this list.
    #[serde(default)]
    pub redact_fields: Vec<String>,
}

fn default_audit_log_path() -> PathBuf {
    PathBuf::from("formgate-audit.log")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            audit_log_path: default_audit_log_path(),
            redact_fields: Vec::new(),
        }
    }
}

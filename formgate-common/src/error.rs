//! Configuration error types

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while locating, parsing, or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No configuration file could be found at any of the known locations.
    #[error("no configuration file found; tried:\n{tried}")]
    NotFound { tried: String },

    /// The configuration file exists but could not be read.
    #[error("failed to read configuration from {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML or has the wrong shape.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// No primary recipient is configured; delivery would have nowhere to go.
    #[error("no primary recipient configured ([identity] to is empty)")]
    MissingRecipient,

    /// A value required by the active configuration is empty.
    #[error("missing required configuration value: {0}")]
    MissingValue(&'static str),
}

impl ConfigError {
    /// The reason code reported to HTTP callers when this error surfaces
    /// at request time.
    #[must_use]
    pub const fn reason_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } | Self::Read { .. } | Self::Parse(_) => "config_missing",
            Self::MissingRecipient => "recipient_missing",
            Self::MissingValue(_) => "config_invalid",
        }
    }
}

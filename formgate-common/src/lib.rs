//! Shared building blocks for the formgate form-submission processor.
//!
//! This crate holds everything the other formgate crates have in common:
//!
//! - [`config`]: the strongly-typed, TOML-backed process configuration
//! - [`logging`]: tracing subscriber initialization
//! - [`audit`]: the append-only, redacted JSON-line audit log
//! - [`submission`]: the per-request submission value object

pub mod audit;
pub mod config;
pub mod error;
pub mod logging;
pub mod submission;

pub use config::Config;
pub use error::ConfigError;
pub use submission::Submission;

//! Minimal SMTP submission client.
//!
//! This crate implements the client side of SMTP message submission as an
//! explicit state machine: each stage consumes exactly one server reply
//! and validates its status code before the next command is sent, so a
//! failure always names the protocol milestone it happened at. TLS via
//! STARTTLS is mandatory before AUTH PLAIN; there is no plaintext
//! authentication path.
//!
//! Socket I/O sits behind the [`Dialog`] trait, so the whole transaction
//! is drivable against a scripted test double with deterministic failure
//! injection.

pub mod dialog;
pub mod error;
pub mod response;
pub mod transaction;

pub use dialog::{Dialog, TcpDialog};
pub use error::SmtpError;
pub use response::Reply;
pub use transaction::{Credentials, Envelope, SmtpTransaction, Stage};

//! Message composition and delivery for formgate.
//!
//! A validated submission is turned into an [`OutboundMessage`] by the
//! [`composer`], after its file parts have passed the [`attachments`]
//! processor. The [`mailer`] then tries the configured transports in
//! order: the HTTP JSON API first (unless skipped by configuration), the
//! hand-implemented SMTP client as fallback. First success wins; both
//! failing is terminal.

pub mod attachments;
pub mod composer;
pub mod error;
pub mod mailer;
pub mod transport;

pub use attachments::Attachment;
pub use composer::OutboundMessage;
pub use error::{AttachmentError, DeliveryFailure, TransportError};
pub use mailer::{DeliveryAttempt, Mailer, Transport};

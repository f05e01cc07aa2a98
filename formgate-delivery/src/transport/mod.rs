pub mod api;
pub mod smtp;

pub use api::ApiTransport;
pub use smtp::SmtpTransport;

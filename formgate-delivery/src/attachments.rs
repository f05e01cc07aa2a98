//! Attachment validation.
//!
//! Raw file parts from the form are either all converted into
//! transport-agnostic descriptors or the whole submission is rejected;
//! no partially validated set is ever forwarded to a transport.

use formgate_common::submission::RawPart;

use crate::error::AttachmentError;

/// A validated attachment, ready for whichever transport carries it. The
/// API transport base64-encodes `bytes`; SMTP delivery of attachments is
/// not supported and drops them (plain-text fallback).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// MIME type for an allow-listed extension. The allow-list is operator
/// configured, so unknown-but-allowed extensions fall back to the generic
/// byte-stream type.
fn mime_for_extension(extension: &str) -> &'static str {
    match extension {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

/// Validate every part or reject the submission.
///
/// Order of checks per part: readability, extension allow-list, then the
/// cumulative size ceiling across all parts.
pub fn process(
    parts: &[RawPart],
    allowed_extensions: &[String],
    max_total_bytes: usize,
) -> Result<Vec<Attachment>, AttachmentError> {
    let mut attachments = Vec::with_capacity(parts.len());
    let mut total = 0usize;

    for part in parts {
        if part.file_name.is_empty() || part.bytes.is_empty() {
            return Err(AttachmentError::Unreadable);
        }

        let Some(extension) = part.extension() else {
            return Err(AttachmentError::DisallowedType {
                name: part.file_name.clone(),
            });
        };
        if !allowed_extensions.iter().any(|a| a.eq_ignore_ascii_case(&extension)) {
            return Err(AttachmentError::DisallowedType {
                name: part.file_name.clone(),
            });
        }

        total = total.saturating_add(part.bytes.len());
        if total > max_total_bytes {
            return Err(AttachmentError::TooLarge {
                limit: max_total_bytes,
            });
        }

        attachments.push(Attachment {
            name: part.file_name.clone(),
            content_type: mime_for_extension(&extension),
            bytes: part.bytes.clone(),
        });
    }

    Ok(attachments)
}

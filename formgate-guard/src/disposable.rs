//! Disposable-email-domain detection.
//!
//! Matching is by substring against a curated list, so `mailinator` also
//! catches `mailinator.nut.cc` and the rest of the alias farm.

/// Known disposable-address providers. Substring match, lowercased input.
const DISPOSABLE_DOMAINS: &[&str] = &[
    "10minutemail",
    "dispostable",
    "fakeinbox",
    "getnada",
    "guerrillamail",
    "maildrop",
    "mailinator",
    "mailnesia",
    "mintemail",
    "mohmal",
    "sharklasers",
    "spamgourmet",
    "tempmail",
    "temp-mail",
    "throwawaymail",
    "trashmail",
    "yopmail",
];

/// Whether `domain` belongs to a known disposable-address provider.
#[must_use]
pub fn is_disposable(domain: &str) -> bool {
    let domain = domain.to_ascii_lowercase();
    DISPOSABLE_DOMAINS
        .iter()
        .any(|blocked| domain.contains(blocked))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_providers_are_flagged() {
        assert!(is_disposable("mailinator.com"));
        assert!(is_disposable("MAILINATOR.COM"));
        assert!(is_disposable("mail.yopmail.fr"));
        assert!(is_disposable("abc.10minutemail.net"));
    }

    #[test]
    fn ordinary_domains_pass() {
        assert!(!is_disposable("example.com"));
        assert!(!is_disposable("gmail.com"));
        assert!(!is_disposable("posteo.de"));
    }
}

//! Free-text PII scrubbing before anything is logged or analysed.

use regex::Regex;
use std::sync::LazyLock;

pub const EMAIL_REDACTION: &str = "<EMAIL_REDACTED>";
const ID_PREFIX: &str = "User_";
const ANON_PREFIX: &str = "Anon_Customer_";

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").expect("Invalid email regex"));

/// Redact email addresses and swap synthetic `User_1234` ids for an anonymous prefix.
pub fn anonymize_pii(text: &str) -> String {
    let redacted = EMAIL_PATTERN.replace_all(text, EMAIL_REDACTION);
    redacted.replace(ID_PREFIX, ANON_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_redacted() {
        assert_eq!(
            anonymize_pii("Contact jan.mueller@example.de about ORD-1042"),
            "Contact <EMAIL_REDACTED> about ORD-1042"
        );
    }

    #[test]
    fn test_user_ids_anonymized() {
        assert_eq!(
            anonymize_pii("User_4821 complained, cc User_1002"),
            "Anon_Customer_4821 complained, cc Anon_Customer_1002"
        );
    }

    #[test]
    fn test_clean_text_untouched() {
        let s = "Van to Kreuzberg, 12 mins late";
        assert_eq!(anonymize_pii(s), s);
    }
}

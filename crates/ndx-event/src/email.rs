//! Recipient address helpers

/// Compare two addresses the way the idempotency guard does
///
/// Surrounding whitespace is ignored and the comparison is ASCII
/// case-insensitive.
#[must_use]
pub fn emails_match(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Mask an address for logs: `alice@example.gov.uk` -> `a***@example.gov.uk`
#[must_use]
pub fn mask_email(email: &str) -> String {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() => {
            let first: String = local.chars().take(1).collect();
            format!("{first}***@{domain}")
        }
        _ => "***".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_local_part() {
        assert_eq!(mask_email("alice@example.gov.uk"), "a***@example.gov.uk");
        assert_eq!(mask_email("not-an-email"), "***");
        assert_eq!(mask_email("@example.gov.uk"), "***");
    }

    #[test]
    fn match_ignores_case_and_whitespace() {
        assert!(emails_match("A@Example.gov.uk", " a@example.gov.uk "));
        assert!(!emails_match("a@example.gov.uk", "b@example.gov.uk"));
    }
}

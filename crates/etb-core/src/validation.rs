use std::sync::OnceLock;

use regex::Regex;

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

/// Structural email check: `local@domain.tld`. No DNS or mailbox lookup.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE
        .get_or_init(|| {
            Regex::new(r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+$").expect("valid regex")
        })
        .is_match(email)
}

//! Input validation shared by registration, settings, and mail dispatch.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::CoreError;

/// Maximum length of an email address (RFC 5321 path limit).
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Maximum length of a user's display name.
pub const MAX_FULL_NAME_LENGTH: usize = 120;

/// Pragmatic address shape check: one `@`, no whitespace, a dot in the domain.
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@.]+$").expect("valid regex")
});

/// Return `true` if `email` looks like a deliverable address.
pub fn is_valid_email(email: &str) -> bool {
    email.len() <= MAX_EMAIL_LENGTH && EMAIL_RE.is_match(email)
}

/// Trim and lower-case an email address for storage and comparison.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validate an email address, returning a [`CoreError::Validation`] on failure.
pub fn validate_email(email: &str) -> Result<(), CoreError> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "'{email}' is not a valid email address"
        )))
    }
}

/// Validate a display name: non-blank and within the length limit.
pub fn validate_full_name(name: &str) -> Result<(), CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("Full name cannot be empty".into()));
    }
    if trimmed.chars().count() > MAX_FULL_NAME_LENGTH {
        return Err(CoreError::Validation(format!(
            "Full name exceeds maximum length of {MAX_FULL_NAME_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Validate an SMTP host/port pair.
pub fn validate_smtp_server(host: &str, port: i32) -> Result<(), CoreError> {
    if host.trim().is_empty() || host.contains(char::is_whitespace) {
        return Err(CoreError::Validation("SMTP host must be a hostname".into()));
    }
    if !(1..=65535).contains(&port) {
        return Err(CoreError::Validation(format!(
            "SMTP port {port} is out of range"
        )));
    }
    Ok(())
}

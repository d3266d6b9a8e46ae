/// Input validators for credential requests
/// Features:
/// 1. DoS Protection: Input length limits
/// 2. Email format validation
/// 3. Password bounds matching what bcrypt can actually verify

use lazy_static::lazy_static;
use regex::Regex;

use crate::auth::MAX_SECRET_LENGTH;
use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_EMAIL_LENGTH: usize = 5;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).unwrap();
}

/// Validates an email address and returns it trimmed.
///
/// Case is preserved: emails are matched exactly as stored.
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("email"));
    }

    if trimmed.len() < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort("email", MIN_EMAIL_LENGTH));
    }

    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email", MAX_EMAIL_LENGTH));
    }

    if !EMAIL_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("email"));
    }

    if has_suspicious_email_patterns(trimmed) {
        return Err(ValidationError::SuspiciousContent("email"));
    }

    Ok(trimmed.to_string())
}

/// Validates a password. Passwords are not trimmed.
pub fn is_valid_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::EmptyField("password"));
    }

    // bcrypt silently ignores everything past this point
    if password.len() > MAX_SECRET_LENGTH {
        return Err(ValidationError::TooLong("password", MAX_SECRET_LENGTH));
    }

    if password.contains('\0') {
        return Err(ValidationError::SuspiciousContent("password"));
    }

    Ok(())
}

fn has_suspicious_email_patterns(email: &str) -> bool {
    // Local part longer than RFC 5321 allows
    if let Some(at_pos) = email.find('@') {
        if at_pos > 64 {
            return true;
        }
    }

    if email.matches('@').count() != 1 {
        return true;
    }

    email.contains('\0')
}

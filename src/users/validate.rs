use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{ApiError, ApiResult};

pub const USERNAME_MAX: usize = 30;
pub const EMAIL_MAX: usize = 255;
pub const BIOGRAPHY_MAX: usize = 255;

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Trims and rejects empty values; used for every required text field.
pub fn non_empty(field: &str, value: &str) -> ApiResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

pub fn validate_username(raw: &str) -> ApiResult<String> {
    let username = non_empty("username", raw)?;
    if username.chars().count() > USERNAME_MAX {
        return Err(ApiError::InvalidInput(format!(
            "username must be at most {USERNAME_MAX} characters"
        )));
    }
    Ok(username)
}

pub fn validate_email(raw: &str) -> ApiResult<String> {
    let email = non_empty("email", raw)?.to_lowercase();
    if email.chars().count() > EMAIL_MAX {
        return Err(ApiError::InvalidInput(format!(
            "email must be at most {EMAIL_MAX} characters"
        )));
    }
    if !is_valid_email(&email) {
        return Err(ApiError::InvalidInput("invalid email address".into()));
    }
    Ok(email)
}

/// Biography may be empty, but is capped.
pub fn validate_biography(raw: &str) -> ApiResult<String> {
    if raw.chars().count() > BIOGRAPHY_MAX {
        return Err(ApiError::InvalidInput(format!(
            "biography must be at most {BIOGRAPHY_MAX} characters"
        )));
    }
    Ok(raw.to_string())
}

pub fn validate_password(raw: &str) -> ApiResult<()> {
    if raw.is_empty() {
        return Err(ApiError::InvalidInput("password must not be empty".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_trims_and_rejects_blank() {
        assert_eq!(non_empty("first_name", "  Ann ").unwrap(), "Ann");
        assert!(non_empty("first_name", "   ").is_err());
        assert!(non_empty("first_name", "").is_err());
    }

    #[test]
    fn username_bounds() {
        assert_eq!(validate_username("ann").unwrap(), "ann");
        assert_eq!(validate_username(&"x".repeat(30)).unwrap().len(), 30);
        assert!(validate_username(&"x".repeat(31)).is_err());
        assert!(validate_username(" ").is_err());
    }

    #[test]
    fn email_syntax_and_length() {
        assert_eq!(validate_email("Ann@X.com ").unwrap(), "ann@x.com");
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("a@b").is_err());
        let long = format!("{}@example.com", "a".repeat(250));
        assert!(validate_email(&long).is_err());
    }

    #[test]
    fn biography_allows_empty_but_caps_length() {
        assert_eq!(validate_biography("").unwrap(), "");
        assert!(validate_biography(&"b".repeat(256)).is_err());
    }

    #[test]
    fn password_must_not_be_empty() {
        assert!(validate_password("s").is_ok());
        assert!(validate_password("").is_err());
    }
}

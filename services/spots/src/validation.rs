//! Input validation utilities

use regex::Regex;
use std::sync::OnceLock;

/// Validate the email used to look up a friend's account
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Please enter an email address".to_string());
    }

    if email.len() > 254 {
        return Err("Email must be at most 254 characters long".to_string());
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

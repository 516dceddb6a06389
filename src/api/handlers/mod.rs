pub mod health;
pub use self::health::health;

pub mod authenticate;
pub use self::authenticate::authenticate;

pub mod user_register;
pub use self::user_register::register;

pub mod users;

pub mod auth;

// common validation for the handlers
use regex::Regex;

pub(crate) fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email))
}

fn strong_password(password: &str) -> bool {
    password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| "!@#$%^&*(),.?\":{}|<>".contains(c))
}

/// Field-level validation for registration and update payloads.
///
/// Returns one message per failed rule; callers join them with ", " for the
/// response body.
pub(crate) fn validate_user_payload(username: &str, password: &str, email: &str) -> Vec<String> {
    let mut errors = Vec::new();

    if username.trim().is_empty() {
        errors.push("Username is mandatory".to_string());
    } else if username.len() < 4 || username.len() > 20 {
        errors.push("Username must be between 4 and 20 characters".to_string());
    }

    if password.is_empty() {
        errors.push("Password is mandatory".to_string());
    } else {
        if password.len() < 8 {
            errors.push("Password must have at least 8 characters".to_string());
        }
        if !strong_password(password) {
            errors.push(
                "Password must contain a digit, a lowercase letter, an uppercase letter, \
                 and a special character"
                    .to_string(),
            );
        }
    }

    if email.trim().is_empty() {
        errors.push("Email is mandatory".to_string());
    } else if !valid_email(email) {
        errors.push("Email should be valid".to_string());
    }

    errors
}

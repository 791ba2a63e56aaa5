use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use super::validation::{FieldErrors, Validate, ValidationErrors};
use super::{RecordId, Role};

pub const MIN_USERNAME_CHARS: usize = 3;
pub const MAX_USERNAME_CHARS: usize = 30;
pub const MIN_PASSWORD_CHARS: usize = 6;
const MAX_PASSWORD_CHARS: usize = 128;
const MAX_EMAIL_CHARS: usize = 254;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Invalid regex"));

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Validated registration. The email is lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl Validate for RegisterRequest {
    type Output = Registration;

    fn validate(self) -> Result<Registration, ValidationErrors> {
        let mut errors = FieldErrors::new();

        let username = errors
            .required_text("username", self.username, MAX_USERNAME_CHARS)
            .filter(|u| {
                let ok = u.chars().count() >= MIN_USERNAME_CHARS;
                if !ok {
                    errors.push(
                        "username",
                        format!("must be at least {MIN_USERNAME_CHARS} characters"),
                    );
                }
                ok
            });

        let email = checked_email(&mut errors, self.email);
        let password = checked_password(&mut errors, self.password, MIN_PASSWORD_CHARS);

        match (username, email, password) {
            (Some(username), Some(email), Some(password)) => errors.finish(|| Registration {
                username,
                email,
                password,
            }),
            _ => Err(errors.into_error()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Validate for LoginRequest {
    type Output = Credentials;

    fn validate(self) -> Result<Credentials, ValidationErrors> {
        let mut errors = FieldErrors::new();
        let email = checked_email(&mut errors, self.email);
        // Length rules only apply on registration; a short password here is
        // simply wrong, not malformed.
        let password = checked_password(&mut errors, self.password, 1);

        match (email, password) {
            (Some(email), Some(password)) => errors.finish(|| Credentials { email, password }),
            _ => Err(errors.into_error()),
        }
    }
}

fn checked_email(errors: &mut FieldErrors, raw: Option<String>) -> Option<String> {
    let email = errors.required_text("email", raw, MAX_EMAIL_CHARS)?;
    if EMAIL_RE.is_match(&email) {
        Some(email.to_lowercase())
    } else {
        errors.push("email", "must be a valid email address");
        None
    }
}

fn checked_password(errors: &mut FieldErrors, raw: Option<String>, min: usize) -> Option<String> {
    // Passwords are taken verbatim; surrounding whitespace is significant.
    match raw {
        Some(p) if p.is_empty() => {
            errors.push("password", "is required");
            None
        }
        Some(p) if p.chars().count() < min => {
            errors.push("password", format!("must be at least {min} characters"));
            None
        }
        Some(p) if p.chars().count() > MAX_PASSWORD_CHARS => {
            errors.push(
                "password",
                format!("must be at most {MAX_PASSWORD_CHARS} characters"),
            );
            None
        }
        Some(p) => Some(p),
        None => {
            errors.push("password", "is required");
            None
        }
    }
}

/// User view safe to hand to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: RecordId,
    pub username: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub token: String,
    pub user: PublicUser,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: Some(username.to_string()),
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        }
    }

    #[test]
    fn test_register_normalizes_email() {
        let reg = register(" alice ", "Alice@Example.COM", "hunter22")
            .validate()
            .unwrap();
        assert_eq!(reg.username, "alice");
        assert_eq!(reg.email, "alice@example.com");
    }

    #[test]
    fn test_register_rejects_bad_fields() {
        let err = register("al", "not-an-email", "12345").validate().unwrap_err();
        assert!(err.has_field("username"));
        assert!(err.has_field("email"));
        assert!(err.has_field("password"));

        let err = register(&"a".repeat(31), "a@b.io", "123456")
            .validate()
            .unwrap_err();
        assert_eq!(err.fields().len(), 1);
        assert!(err.has_field("username"));
    }

    #[test]
    fn test_login_requires_both_fields() {
        let err = LoginRequest::default().validate().unwrap_err();
        assert!(err.has_field("email"));
        assert!(err.has_field("password"));

        let creds = LoginRequest {
            email: Some("BOB@example.com".to_string()),
            password: Some("x".to_string()),
        }
        .validate()
        .unwrap();
        assert_eq!(creds.email, "bob@example.com");
    }

    #[test]
    fn test_public_user_hides_missing_last_login() {
        let user = PublicUser {
            id: RecordId::parse("64ae0f1c2b3d4e5f60718293").unwrap(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            role: Role::Admin,
            last_login: None,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["role"], "admin");
        assert!(json.get("lastLogin").is_none());
        assert!(json.get("passwordHash").is_none());
    }
}

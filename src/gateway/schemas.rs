//! JSON request/response bodies for the user endpoints.

use crate::auth::{NewUser, User};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Maximum username length (characters, after trimming).
pub const MAX_USERNAME_LEN: usize = 64;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)*\.[A-Za-z]{2,}$")
        .expect("email pattern is valid")
});

/// `POST /users` body.
#[derive(Clone, Deserialize)]
pub struct UserCreate {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for UserCreate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCreate")
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl UserCreate {
    /// Collect every field problem; an empty list means the body is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        let username = self.username.trim();
        if username.is_empty() {
            problems.push("username: must not be empty".to_string());
        } else if username.chars().count() > MAX_USERNAME_LEN {
            problems.push(format!(
                "username: must be at most {MAX_USERNAME_LEN} characters"
            ));
        }

        if !is_valid_email(&self.email) {
            problems.push("email: value is not a valid email address".to_string());
        }

        problems
    }

    /// Store input, exactly as submitted. Call after [`UserCreate::validate`].
    pub fn into_new_user(self) -> NewUser {
        NewUser {
            username: self.username,
            email: self.email,
            password: self.password,
        }
    }
}

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= 254 && EMAIL_PATTERN.is_match(email)
}

/// Public view of a user. Never carries the password or its hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRead {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserRead {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            created_at: user.created_at,
        }
    }
}

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(username: &str, email: &str) -> UserCreate {
        UserCreate {
            username: username.into(),
            email: email.into(),
            password: "secret123".into(),
        }
    }

    #[test]
    fn valid_body_has_no_problems() {
        let user = body("pavan", "pavan@example.com");
        assert!(user.validate().is_empty());
        let new_user = user.into_new_user();
        assert_eq!(new_user.username, "pavan");
        assert_eq!(new_user.email, "pavan@example.com");
        assert_eq!(new_user.password, "secret123");
    }

    #[test]
    fn invalid_email_is_reported() {
        let problems = body("pavan", "not-an-email").validate();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].starts_with("email"));
    }

    #[test]
    fn email_pattern_cases() {
        assert!(is_valid_email("a.b+tag@sub.example.co"));
        assert!(is_valid_email("user_1@example.io"));
        assert!(!is_valid_email("missing-at.example.com"));
        assert!(!is_valid_email("two@@example.com"));
        assert!(!is_valid_email("user@localhost"));
        assert!(!is_valid_email("user@-bad.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn blank_and_long_usernames_are_reported() {
        assert_eq!(body("   ", "a@example.com").validate().len(), 1);
        let long = "x".repeat(MAX_USERNAME_LEN + 1);
        assert_eq!(body(&long, "a@example.com").validate().len(), 1);
        let max = "x".repeat(MAX_USERNAME_LEN);
        assert!(body(&max, "a@example.com").validate().is_empty());
    }

    #[test]
    fn values_are_stored_as_submitted() {
        let user = body(" pavan ", "pavan@example.com");
        assert!(user.validate().is_empty());
        let new_user = user.into_new_user();
        assert_eq!(new_user.username, " pavan ");
        assert_eq!(new_user.email, "pavan@example.com");
    }

    #[test]
    fn padded_email_is_reported() {
        let problems = body("pavan", " pavan@example.com ").validate();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].starts_with("email"));
    }

    #[test]
    fn missing_field_fails_to_deserialize() {
        let parsed: Result<UserCreate, _> =
            serde_json::from_str(r#"{"username": "pavan", "email": "p@example.com"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn debug_hides_password() {
        let rendered = format!("{:?}", body("pavan", "pavan@example.com"));
        assert!(!rendered.contains("secret123"));
    }

    #[test]
    fn user_read_omits_password_hash() {
        let user = User {
            id: 1,
            username: "pavan".into(),
            email: "pavan@example.com".into(),
            password_hash: "1000$c2FsdA==$a2V5".into(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(UserRead::from(&user)).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["username"], "pavan");
        assert!(json.get("created_at").is_some());
        assert!(json.get("password_hash").is_none());
        assert!(json.get("password").is_none());
    }
}

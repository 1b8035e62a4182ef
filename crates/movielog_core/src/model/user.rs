//! User domain model and registration input validation.
//!
//! # Responsibility
//! - Define the canonical user record returned by every backend.
//! - Validate registration/profile input before any write path runs.
//!
//! # Invariants
//! - `id` is backend-assigned, positive, and stable for the user lifetime.
//! - `password_hash` is opaque to callers; only `auth` produces/verifies it.
//! - Write paths must call `UserDraft::validate()` before persisting.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Stable identifier assigned to a user by its owning backend.
pub type UserId = i64;

const MIN_NAME_CHARS: usize = 3;
const MAX_NAME_CHARS: usize = 100;
const MIN_PASSWORD_CHARS: usize = 3;

/// Canonical user record.
///
/// Owned movies are not embedded here; they are retrieved through the
/// storage contract so one shape works for nested and relational layouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Backend-assigned id, never reused while a higher id exists.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Login name, unique across all users of one backend instance.
    pub username: String,
    /// Optional contact address, unique when present.
    pub email: Option<String>,
    /// Opaque one-way hash produced by the `auth` module.
    pub password_hash: String,
}

/// Registration input for `create_user`.
///
/// Carries the plaintext password exactly once; backends hash it through
/// `auth::hash_password` and never persist the plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDraft {
    pub name: String,
    pub username: String,
    pub email: Option<String>,
    pub password: String,
}

/// Profile mutation input for `update_user`.
///
/// The authenticating plaintext password travels as a separate operation
/// parameter, not inside this shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserUpdate {
    pub name: String,
    pub username: String,
    pub email: Option<String>,
}

/// Validation failure for registration input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserValidationError {
    NameLength { actual: usize },
    NameNumeric,
    PasswordTooShort { actual: usize },
}

impl Display for UserValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NameLength { actual } => write!(
                f,
                "name must be between {MIN_NAME_CHARS} and {MAX_NAME_CHARS} characters, got {actual}"
            ),
            Self::NameNumeric => write!(f, "name must not be purely numeric"),
            Self::PasswordTooShort { actual } => write!(
                f,
                "password must be at least {MIN_PASSWORD_CHARS} characters, got {actual}"
            ),
        }
    }
}

impl Error for UserValidationError {}

impl UserDraft {
    /// Checks registration input against the account rules.
    ///
    /// # Invariants
    /// - `name` length is within `3..100` characters and not all digits.
    /// - `password` is at least 3 characters.
    pub fn validate(&self) -> Result<(), UserValidationError> {
        let name = self.name.trim();
        let name_chars = name.chars().count();
        if name_chars < MIN_NAME_CHARS || name_chars >= MAX_NAME_CHARS {
            return Err(UserValidationError::NameLength { actual: name_chars });
        }
        if !name.is_empty() && name.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(UserValidationError::NameNumeric);
        }
        let password_chars = self.password.chars().count();
        if password_chars < MIN_PASSWORD_CHARS {
            return Err(UserValidationError::PasswordTooShort {
                actual: password_chars,
            });
        }
        Ok(())
    }
}

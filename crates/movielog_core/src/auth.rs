//! Credential hashing and verification.
//!
//! # Responsibility
//! - Provide the one-way hash/verify capability every backend shares.
//! - Keep the hashing scheme opaque to callers and storage layouts.
//!
//! # Invariants
//! - Plaintext passwords never reach a persistence medium.
//! - Verification never panics and never errors; a malformed stored hash
//!   verifies as `false` like any mismatch.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Failure while producing a password hash.
#[derive(Debug)]
pub struct CredentialError(bcrypt::BcryptError);

impl Display for CredentialError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "password hashing failed: {}", self.0)
    }
}

impl Error for CredentialError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

/// Hashes a plaintext password into an opaque storable string.
pub fn hash_password(plaintext: &str) -> Result<String, CredentialError> {
    bcrypt::hash(plaintext, bcrypt::DEFAULT_COST).map_err(CredentialError)
}

/// Checks a plaintext password against a stored hash.
///
/// Returns `false` on mismatch and on hashes that cannot be parsed, so a
/// corrupted stored value behaves like a failed login instead of an error.
pub fn verify_password(stored_hash: &str, plaintext: &str) -> bool {
    bcrypt::verify(plaintext, stored_hash).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::{hash_password, verify_password};

    #[test]
    fn hash_then_verify_roundtrip() {
        let hash = hash_password("secret").unwrap();
        assert!(verify_password(&hash, "secret"));
        assert!(!verify_password(&hash, "wrong"));
    }

    #[test]
    fn malformed_hash_verifies_false() {
        assert!(!verify_password("not-a-real-hash", "secret"));
        assert!(!verify_password("", "secret"));
    }

    #[test]
    fn hashes_are_salted() {
        let first = hash_password("secret").unwrap();
        let second = hash_password("secret").unwrap();
        assert_ne!(first, second);
    }
}

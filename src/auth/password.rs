//! Password validation and hashing.
//!
//! [ValidatedPassword] wraps a string that satisfies the sign-up password rules.
//! [PasswordHash] converts a [ValidatedPassword] into a salted and hashed password.

use std::fmt::Display;

use bcrypt::{BcryptError, hash, verify};
use serde::{Deserialize, Serialize};

use crate::Error;

/// The minimum number of characters in a password.
pub const PASSWORD_MIN_LENGTH: usize = 8;

/// A password that has been validated, but not yet hashed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedPassword(String);

impl ValidatedPassword {
    /// Create and validate a new password from a string.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidPassword] with the first rule that the password
    /// breaks. A password must be at least [PASSWORD_MIN_LENGTH] characters
    /// long and contain a number, a lowercase letter, an uppercase letter and
    /// a symbol.
    pub fn new(raw_password_string: &str) -> Result<Self, Error> {
        let rules: [(fn(&str) -> bool, &str); 5] = [
            (
                |password| password.chars().count() >= PASSWORD_MIN_LENGTH,
                "Password must be 8 characters long",
            ),
            (
                |password| password.chars().any(|c| c.is_ascii_digit()),
                "Password requires a number",
            ),
            (
                |password| password.chars().any(|c| c.is_ascii_lowercase()),
                "Password requires a lowercase letter",
            ),
            (
                |password| password.chars().any(|c| c.is_ascii_uppercase()),
                "Password requires a uppercase letter",
            ),
            (
                |password| password.chars().any(is_symbol),
                "Password requires a symbol",
            ),
        ];

        for (is_satisfied, message) in rules {
            if !is_satisfied(raw_password_string) {
                return Err(Error::InvalidPassword(message.to_owned()));
            }
        }

        Ok(Self(raw_password_string.to_owned()))
    }

    /// Create a new `ValidatedPassword` without any validation.
    ///
    /// The caller should ensure that `raw_password_string` is a valid and secure password.
    pub fn new_unchecked(raw_password_string: &str) -> Self {
        Self(raw_password_string.to_owned())
    }
}

/// Anything that is not a letter, digit or underscore counts as a symbol.
fn is_symbol(c: char) -> bool {
    !(c.is_ascii_alphanumeric() || c == '_')
}

impl Display for ValidatedPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", str::repeat("*", 8))
    }
}

/// A salted and hashed password.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// An alias for the default encryption cost for hashing passwords.
    pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;

    /// Create a hashed password from a validated password with the specified `cost`.
    ///
    /// `cost` increases the rounds of hashing and therefore the time needed to verify a password.
    /// Pass in [PasswordHash::DEFAULT_COST] to use the recommended cost.
    ///
    /// # Errors
    ///
    /// This function will return an error if the password could not be hashed.
    pub fn new(password: ValidatedPassword, cost: u32) -> Result<Self, Error> {
        hash(&password.0, cost)
            .map(Self)
            .map_err(|error| Error::HashingError(error.to_string()))
    }

    /// Wrap a hash that was read back from the database.
    pub fn new_unchecked(raw_password_hash: &str) -> Self {
        Self(raw_password_hash.to_owned())
    }

    /// Check that `raw_password` matches the stored password.
    pub fn verify(&self, raw_password: &str) -> Result<bool, BcryptError> {
        verify(raw_password, &self.0)
    }
}

impl Display for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

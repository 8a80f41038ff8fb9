//! Argon2id hashing for login and app passwords.
//!
//! Hashes are stored as PHC strings so the algorithm parameters and salt
//! travel with the hash.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use courier_core::error::CoreError;

/// Minimum length for login and app passwords.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Upper bound, to keep hashing cost bounded.
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Hash a plaintext password using Argon2id with a random salt.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a plaintext password against a stored PHC hash.
///
/// Returns `Ok(false)` on mismatch; `Err` only for a malformed stored hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Enforce the length bounds and require both a letter and a digit.
pub fn validate_password_strength(password: &str) -> Result<(), CoreError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LENGTH {
        return Err(CoreError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters long"
        )));
    }
    if len > MAX_PASSWORD_LENGTH {
        return Err(CoreError::Validation(format!(
            "Password must be at most {MAX_PASSWORD_LENGTH} characters long"
        )));
    }
    let has_letter = password.chars().any(char::is_alphabetic);
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !(has_letter && has_digit) {
        return Err(CoreError::Validation(
            "Password must contain at least one letter and one digit".into(),
        ));
    }
    Ok(())
}

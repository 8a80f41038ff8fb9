//! Short-lived numeric verification codes.

use chrono::Duration;
use rand::Rng;

use crate::hashing::hmac_sha256_hex;
use crate::types::Timestamp;

/// Number of digits in a code.
pub const CODE_LENGTH: usize = 6;

/// Lifetime of a code.
pub const CODE_TTL_MINUTES: i64 = 10;

/// Wrong guesses allowed before an outstanding code is burned.
pub const MAX_CODE_ATTEMPTS: i32 = 5;

/// Purpose tag for password reset codes.
pub const PURPOSE_PASSWORD_RESET: &str = "password_reset";

/// A freshly issued code. Only `hash` is persisted.
pub struct IssuedCode {
    pub plaintext: String,
    pub hash: String,
    pub expires_at: Timestamp,
}

/// Generate a zero-padded random code and its keyed hash.
pub fn issue_code(secret: &[u8], now: Timestamp) -> IssuedCode {
    let n: u32 = rand::rng().random_range(0..10u32.pow(CODE_LENGTH as u32));
    let plaintext = format!("{n:0width$}", width = CODE_LENGTH);
    let hash = hash_code(secret, &plaintext);
    IssuedCode {
        plaintext,
        hash,
        expires_at: now + Duration::minutes(CODE_TTL_MINUTES),
    }
}

/// Keyed hash of a code as typed by the user (surrounding whitespace ignored).
pub fn hash_code(secret: &[u8], code: &str) -> String {
    hmac_sha256_hex(secret, code.trim().as_bytes())
}

/// Whether the user-supplied string has the shape of a code at all.
pub fn is_well_formed(code: &str) -> bool {
    let code = code.trim();
    code.len() == CODE_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}

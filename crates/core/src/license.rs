//! License key format and lifecycle rules.
//!
//! A license key gates registration and login. Keys are issued by an admin,
//! can carry an expiry, and can be revoked at any time. Many users may share
//! one key.

use rand::Rng;
use serde::Serialize;

use crate::error::CoreError;
use crate::types::Timestamp;

/// Number of dash-separated groups in a generated key.
pub const KEY_GROUPS: usize = 4;

/// Characters per group.
pub const KEY_GROUP_LENGTH: usize = 5;

/// Alphabet for generated keys. Excludes `0`, `O`, `1` and `I`.
const KEY_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Effective state of a license key at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    Active,
    Expired,
    Revoked,
}

impl LicenseStatus {
    /// Evaluate a key's status. Revocation takes precedence over expiry, and
    /// a key whose expiry equals `now` is already expired.
    pub fn evaluate(is_revoked: bool, expires_at: Option<Timestamp>, now: Timestamp) -> Self {
        if is_revoked {
            return Self::Revoked;
        }
        match expires_at {
            Some(expiry) if expiry <= now => Self::Expired,
            _ => Self::Active,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        }
    }
}

/// Reject any key that is not [`LicenseStatus::Active`].
pub fn ensure_usable(status: LicenseStatus) -> Result<(), CoreError> {
    match status {
        LicenseStatus::Active => Ok(()),
        LicenseStatus::Expired => Err(CoreError::Forbidden(
            "License key has expired. Contact your administrator.".into(),
        )),
        LicenseStatus::Revoked => Err(CoreError::Forbidden(
            "License key has been revoked. Contact your administrator.".into(),
        )),
    }
}

/// Generate a new random key such as `K7QDM-2XWPA-9HZTE-R4NBC`.
pub fn generate_license_key() -> String {
    let mut rng = rand::rng();
    (0..KEY_GROUPS)
        .map(|_| {
            (0..KEY_GROUP_LENGTH)
                .map(|_| KEY_ALPHABET[rng.random_range(0..KEY_ALPHABET.len())] as char)
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Canonical form of user-typed key input: trimmed and upper-cased.
pub fn normalize_license_key(input: &str) -> String {
    input.trim().to_uppercase()
}

/// Validate the shape of a key supplied at registration.
pub fn validate_license_key_format(key: &str) -> Result<(), CoreError> {
    let groups: Vec<&str> = key.split('-').collect();
    let well_formed = groups.len() == KEY_GROUPS
        && groups.iter().all(|g| {
            g.len() == KEY_GROUP_LENGTH && g.bytes().all(|b| b.is_ascii_alphanumeric())
        });
    if well_formed {
        Ok(())
    } else {
        Err(CoreError::Validation("License key format is invalid".into()))
    }
}

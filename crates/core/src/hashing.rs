//! Shared digest helpers.
//!
//! Refresh tokens are stored as plain SHA-256 digests. Verification codes are
//! short enough to brute-force, so they are stored as HMAC-SHA256 keyed with a
//! server secret instead.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Compute an HMAC-SHA256 hex digest of `data` keyed with `secret`.
pub fn hmac_sha256_hex(secret: &[u8], data: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(data);
    let digest = mac.finalize().into_bytes();
    format!("{digest:x}")
}

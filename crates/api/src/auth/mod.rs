//! Authentication primitives.
//!
//! - [`password`] -- Argon2id hashing for login and app passwords.
//! - [`jwt`] -- access tokens and refresh-token helpers.

pub mod jwt;
pub mod password;

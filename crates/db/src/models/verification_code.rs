//! Verification code model.

use courier_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `verification_codes` table. Only the keyed hash of the code
/// is stored.
#[derive(Debug, Clone, FromRow)]
pub struct VerificationCode {
    pub id: DbId,
    pub user_id: DbId,
    pub code_hash: String,
    pub purpose: String,
    pub expires_at: Timestamp,
    /// Wrong guesses made against this code.
    pub attempts: i32,
    pub consumed_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

/// DTO for storing a newly issued code.
pub struct CreateVerificationCode {
    pub user_id: DbId,
    pub code_hash: String,
    pub purpose: String,
    pub expires_at: Timestamp,
}

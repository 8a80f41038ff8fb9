pub mod auth;
pub mod contacts;
pub mod license_keys;
pub mod mail;
pub mod notes;
pub mod settings;

use courier_core::error::CoreError;
use courier_core::types::DbId;
use courier_db::models::user::User;
use courier_db::repositories::UserRepo;
use courier_db::DbPool;

use crate::error::{AppError, AppResult};

/// Load the row behind an access token. A token can outlive its user.
pub(crate) async fn load_current_user(pool: &DbPool, user_id: DbId) -> AppResult<User> {
    UserRepo::find_by_id(pool, user_id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::Unauthorized("User no longer exists".into())))
}

/// Primary key type shared by every Courier table (`BIGSERIAL`).
pub type DbId = i64;

/// Stored as `TIMESTAMPTZ` and always handled in UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

//! Note validation.

use crate::error::CoreError;

/// Maximum length of a note title in characters.
pub const MAX_NOTE_TITLE_LENGTH: usize = 200;

/// Maximum length of note content in characters.
pub const MAX_NOTE_CONTENT_LENGTH: usize = 20_000;

/// Validate a note title: may be empty, must fit the limit.
pub fn validate_note_title(title: &str) -> Result<(), CoreError> {
    if title.chars().count() > MAX_NOTE_TITLE_LENGTH {
        return Err(CoreError::Validation(format!(
            "Note title exceeds maximum length of {MAX_NOTE_TITLE_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Validate note content: must be non-blank and within the length limit.
pub fn validate_note_content(content: &str) -> Result<(), CoreError> {
    if content.trim().is_empty() {
        return Err(CoreError::Validation("Note content cannot be empty".into()));
    }
    if content.chars().count() > MAX_NOTE_CONTENT_LENGTH {
        return Err(CoreError::Validation(format!(
            "Note content exceeds maximum length of {MAX_NOTE_CONTENT_LENGTH} characters"
        )));
    }
    Ok(())
}

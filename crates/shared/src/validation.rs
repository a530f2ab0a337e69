//! Input rules shared by the server (authoritative) and the CLI (fail fast)

use thiserror::Error;

pub const MAX_MESSAGE_CHARS: usize = 500;
pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_DISPLAY_NAME_CHARS: usize = 50;
pub const MAX_CODE_CHARS: usize = 12;

/// Characters a generated join code is drawn from
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} cannot exceed {max} characters")]
    TooLong { field: &'static str, max: usize },
}

fn bounded(raw: &str, field: &'static str, max: usize) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    if trimmed.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(trimmed.to_string())
}

/// Trimmed message text, 1..=500 characters
pub fn message_text(raw: &str) -> Result<String, ValidationError> {
    bounded(raw, "text", MAX_MESSAGE_CHARS)
}

pub fn session_title(raw: &str) -> Result<String, ValidationError> {
    bounded(raw, "title", MAX_TITLE_CHARS)
}

pub fn display_name(raw: &str) -> Result<String, ValidationError> {
    bounded(raw, "display_name", MAX_DISPLAY_NAME_CHARS)
}

/// Codes are case-insensitive; the stored form is uppercase
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// Cheap shape check before asking the server about a code
pub fn is_well_formed_code(code: &str) -> bool {
    let code = code.trim();
    !code.is_empty()
        && code.len() <= MAX_CODE_CHARS
        && code.chars().all(|c| c.is_ascii_alphanumeric())
}

//! Shared validation functions for user-entered names.
//!
//! This module provides centralized validation rules so items, categories,
//! shortcuts, and group names are held to the same checks no matter which
//! entry point (session API, onboarding, CLI) submitted them.

use crate::error::{PantryError, Result};

// ============================================================================
// Constants
// ============================================================================

/// Maximum length for item, category, shortcut, and group names (in characters).
pub const MAX_NAME_LENGTH: usize = 200;

// ============================================================================
// Name Validation
// ============================================================================

/// Validates a name and returns its trimmed form.
///
/// Rules:
/// - Must not be empty or whitespace-only after trimming
/// - Must not exceed MAX_NAME_LENGTH characters
/// - Must not contain control characters (including newlines)
///
/// # Arguments
/// * `raw` - The name as entered
/// * `entity` - What is being named, for error messages ("item", "category", ...)
pub fn validate_name(raw: &str, entity: &'static str) -> Result<String> {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return Err(PantryError::EmptyName(entity));
    }

    let actual = trimmed.chars().count();
    if actual > MAX_NAME_LENGTH {
        return Err(PantryError::NameTooLong {
            entity,
            max: MAX_NAME_LENGTH,
            actual,
        });
    }

    if trimmed.chars().any(|c| c.is_control()) {
        return Err(PantryError::InvalidName(entity));
    }

    Ok(trimmed.to_string())
}

/// Case-insensitive, whitespace-insensitive name equality.
///
/// Uses `unicase` for correct Unicode case folding rather than ASCII-only lowering.
pub fn names_match(a: &str, b: &str) -> bool {
    unicase::UniCase::new(a.trim()) == unicase::UniCase::new(b.trim())
}

/// Split a multi-name submission on `separator`, trimming each part and
/// dropping empty ones. Submission order is preserved.
pub fn split_submission(input: &str, separator: &str) -> Vec<String> {
    input
        .split(separator)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

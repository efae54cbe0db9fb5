//! Validation module
//!
//! Provides validation for caller supplied names:
//! - File display names: length, no path separators or control characters
//! - Category names: single directory component, same character rules
//! - Collection names: length, trimmed non-empty

use std::sync::OnceLock;

use regex::Regex;

use crate::error::AppError;

/// Maximum length for file, category and collection names
pub const MAX_NAME_LENGTH: usize = 255;

fn forbidden_chars() -> Result<&'static Regex, AppError> {
    static PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    // Path separators, characters rejected by common filesystems, and control characters.
    PATTERN
        .get_or_init(|| Regex::new(r#"[/\\:*?"<>|\x00-\x1F]"#))
        .as_ref()
        .map_err(|e| AppError::Internal(format!("Failed to compile name validation regex: {}", e)))
}

fn check_name(kind: &str, name: &str) -> Result<(), AppError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{} cannot be empty", kind)));
    }

    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(AppError::Validation(format!(
            "{} '{}' exceeds maximum length of {} characters",
            kind, trimmed, MAX_NAME_LENGTH
        )));
    }

    if trimmed == "." || trimmed == ".." {
        return Err(AppError::Validation(format!(
            "{} '{}' is not allowed",
            kind, trimmed
        )));
    }

    if forbidden_chars()?.is_match(trimmed) {
        return Err(AppError::Validation(format!(
            "{} '{}' contains invalid characters. Not allowed: / \\ : * ? \" < > | and control characters",
            kind, trimmed
        )));
    }

    Ok(())
}

/// Validate a display name used as the logical filename
pub fn validate_file_name(name: &str) -> Result<(), AppError> {
    check_name("File name", name)
}

/// Validate a category; it becomes a directory directly under the storage root
pub fn validate_category(category: &str) -> Result<(), AppError> {
    check_name("Category", category)?;
    if category.trim().starts_with('.') {
        return Err(AppError::Validation(format!(
            "Category '{}' cannot start with a dot",
            category.trim()
        )));
    }
    Ok(())
}

/// Validate a collection name
pub fn validate_collection_name(name: &str) -> Result<(), AppError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(
            "Collection name cannot be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(AppError::Validation(format!(
            "Collection name exceeds maximum length of {} characters",
            MAX_NAME_LENGTH
        )));
    }
    Ok(())
}

//! Shared key generation for the storage layout.
//!
//! Active objects: `{name}_{YYYYMMDD_HHMMSS_ffffff}.{ext}` directly under the root, or
//! under `{category}/` when a category is given.
//!
//! Recycled objects: `{recycle_dir}/{YYYYMMDDTHHMMSSfff}/{original key}`. The first
//! component after the recycle directory is the move time.

use std::path::{Component, Path};

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::traits::{StorageError, StorageResult};

const PHYSICAL_TOKEN_FORMAT: &str = "%Y%m%d_%H%M%S_%6f";
const RECYCLE_TOKEN_FORMAT: &str = "%Y%m%dT%H%M%S%3f";

/// Split a file name into (stem, extension without dot).
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => (&name[..idx], &name[idx + 1..]),
        _ => (name, ""),
    }
}

/// Physical file name for a save at `now`; `attempt > 0` adds a `_{attempt}` suffix.
pub fn physical_name(base: &str, extension: &str, now: DateTime<Utc>, attempt: u32) -> String {
    let token = now.format(PHYSICAL_TOKEN_FORMAT);
    let suffix = if attempt > 0 {
        format!("_{}", attempt)
    } else {
        String::new()
    };
    if extension.is_empty() {
        format!("{}_{}{}", base, token, suffix)
    } else {
        format!("{}_{}{}.{}", base, token, suffix, extension)
    }
}

/// Active-tree key for a physical name.
pub fn active_key(category: Option<&str>, physical_name: &str) -> String {
    match category {
        Some(category) => format!("{}/{}", category, physical_name),
        None => physical_name.to_string(),
    }
}

pub fn recycle_token(now: DateTime<Utc>) -> String {
    now.format(RECYCLE_TOKEN_FORMAT).to_string()
}

/// Recycle key for an active key moved aside at `now`.
pub fn recycle_key(recycle_dir: &str, now: DateTime<Utc>, original_key: &str) -> String {
    format!("{}/{}/{}", recycle_dir, recycle_token(now), original_key)
}

/// Parse the move time out of a recycle token.
pub fn parse_recycle_token(token: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(token, RECYCLE_TOKEN_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// The token component of a recycle key, if the key is inside `recycle_dir`.
pub fn recycle_token_of<'a>(recycle_dir: &str, recycle_key: &'a str) -> Option<&'a str> {
    let rest = recycle_key.strip_prefix(recycle_dir)?.strip_prefix('/')?;
    rest.split('/').next().filter(|t| !t.is_empty())
}

/// Reject keys that could escape the storage root.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if key.starts_with('/')
        || key.starts_with('\\')
        || key.split(['/', '\\']).any(|segment| segment == "..")
    {
        return Err(StorageError::InvalidKey(
            format!("Storage key '{}' escapes the storage root", key),
        ));
    }
    if Path::new(key)
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(StorageError::InvalidKey(format!(
            "Storage key '{}' is not a relative path",
            key
        )));
    }
    Ok(())
}

/// `/`-separated key for a path relative to the storage root.
pub fn key_from_relative(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

//! Duplicate-name detection and unique-name generation for logical filenames.
//!
//! Both operate on the names of active records only; soft-deleted records never block a
//! name.

/// True if an active record already uses `base_name`.
pub fn check_duplicate<'a, I>(active_names: I, base_name: &str) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    active_names.into_iter().any(|name| name == base_name)
}

/// `base_name (n)` for the smallest `n >= 1` that `is_taken` rejects.
pub fn generate_unique_name<F>(base_name: &str, is_taken: F) -> String
where
    F: Fn(&str) -> bool,
{
    (1u64..)
        .map(|n| format!("{} ({})", base_name, n))
        .find(|candidate| !is_taken(candidate))
        .unwrap_or_else(|| base_name.to_string())
}

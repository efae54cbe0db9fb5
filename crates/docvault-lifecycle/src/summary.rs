//! Storage usage summary.

use docvault_core::{CategoryUsage, StorageSummary};
use docvault_db::{CollectionsDocument, FilesDocument};
use docvault_storage::StorageUsage;

/// Combine record counts with the byte totals the storage layer measured.
///
/// Categories are ordered by bytes, largest first, with uncategorised files last on ties.
pub fn summarize(
    files: &FilesDocument,
    collections: &CollectionsDocument,
    usage: StorageUsage,
    quota: Option<u64>,
) -> StorageSummary {
    let mut categories: Vec<CategoryUsage> = usage
        .categories
        .into_iter()
        .map(|c| CategoryUsage {
            category: c.category,
            file_count: c.file_count,
            bytes: c.bytes,
        })
        .collect();
    categories.sort_by(|a, b| {
        b.bytes
            .cmp(&a.bytes)
            .then_with(|| b.category.is_some().cmp(&a.category.is_some()))
            .then_with(|| a.category.cmp(&b.category))
    });

    let mut summary = StorageSummary {
        active_files: files.uploaded_files.len(),
        deleted_files: files.deleted_files.len(),
        collections: collections.collections.len(),
        used_bytes: usage.active_bytes,
        recycle_bytes: usage.recycle_bytes,
        categories,
        capacity_bytes: None,
        free_bytes: None,
        used_percent: None,
    };
    summary.apply_quota(quota);
    summary
}

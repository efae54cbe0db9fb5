//! Storage usage and recycle-bin reporting models.

use serde::Serialize;

use super::file::FileRecord;

/// Bytes and file count held by one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryUsage {
    /// `None` for files stored directly under the root.
    pub category: Option<String>,
    pub file_count: usize,
    pub bytes: u64,
}

/// Snapshot of vault usage for the dashboard chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageSummary {
    pub active_files: usize,
    pub deleted_files: usize,
    pub collections: usize,
    pub used_bytes: u64,
    pub recycle_bytes: u64,
    pub categories: Vec<CategoryUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_percent: Option<f64>,
}

impl StorageSummary {
    /// Fill capacity, free space and percentage from a configured quota.
    pub fn apply_quota(&mut self, quota: Option<u64>) {
        let Some(capacity) = quota.filter(|q| *q > 0) else {
            return;
        };
        let total = self.used_bytes + self.recycle_bytes;
        self.capacity_bytes = Some(capacity);
        self.free_bytes = Some(capacity.saturating_sub(total));
        self.used_percent = Some((total as f64 / capacity as f64 * 100.0).min(100.0));
    }
}

/// A soft-deleted record with its retention countdown
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecycleBinInfo {
    #[serde(flatten)]
    pub record: FileRecord,
    pub age_days: i64,
    pub days_remaining: i64,
}

impl RecycleBinInfo {
    pub fn new(record: FileRecord, age_days: i64, retention_days: u32) -> Self {
        let days_remaining = (i64::from(retention_days) - age_days).max(0);
        Self {
            record,
            age_days,
            days_remaining,
        }
    }
}

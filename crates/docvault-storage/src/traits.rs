//! Storage abstraction trait
//!
//! This module defines the Storage trait that every storage backend implements, plus the
//! structured results its operations return.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docvault_core::AppError;
use serde::Serialize;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Source file not found: {0}")]
    SourceNotFound(String),

    #[error("Save failed: {0}")]
    SaveFailed(String),

    #[error("Move failed: {0}")]
    MoveFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidKey(msg) => AppError::Validation(msg),
            StorageError::ConfigError(msg) => AppError::Internal(msg),
            other => AppError::Io(other.to_string()),
        }
    }
}

/// Where `save` put the bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedObject {
    /// Key relative to the storage root, `/` separated.
    pub storage_path: String,
    /// Logical name the object was saved under (extension stripped).
    pub final_name: String,
    /// Extension without the leading dot; empty when the source has none.
    pub extension: String,
    pub size_bytes: u64,
}

/// Where `move_to_recycle_bin` put the bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecycledObject {
    pub recycle_path: String,
    /// Move time at document precision (whole seconds).
    pub deleted_at: DateTime<Utc>,
}

/// Outcome of a retention sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    /// Recycle keys whose objects were removed.
    pub purged_paths: Vec<String>,
    pub count: usize,
    /// Objects old enough to purge that could not be removed.
    pub failed_paths: Vec<String>,
}

/// Bytes held under one category directory of the active tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryBytes {
    pub category: Option<String>,
    pub file_count: usize,
    pub bytes: u64,
}

/// Byte totals for the managed root
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StorageUsage {
    pub active_bytes: u64,
    pub recycle_bytes: u64,
    pub categories: Vec<CategoryBytes>,
}

/// Storage abstraction trait
///
/// Owns the physical bytes of every file: the active tree partitioned by category and
/// the recycle area holding soft-deleted objects. All keys are relative to the storage
/// root and must not contain `..` or start with `/`.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Copy `source` into the active tree under `desired_name`, in the category
    /// subdirectory when one is given.
    ///
    /// A failure leaves no partial object behind.
    async fn save(
        &self,
        source: &Path,
        desired_name: &str,
        category: Option<&str>,
    ) -> StorageResult<SavedObject>;

    /// Remove an object from the active tree. Missing objects are tolerated.
    async fn delete(&self, storage_path: &str) -> StorageResult<()>;

    /// Move an active object into the recycle area, recording the move time.
    async fn move_to_recycle_bin(&self, storage_path: &str) -> StorageResult<RecycledObject>;

    /// Move a recycled object back to `original_path`.
    ///
    /// Fails with `NotFound` when the recycle object is missing.
    async fn restore_from_recycle_bin(
        &self,
        recycle_path: &str,
        original_path: &str,
    ) -> StorageResult<()>;

    /// Irreversibly remove a recycled object.
    ///
    /// Returns `false` when the object was already gone.
    async fn permanently_delete(&self, recycle_path: &str) -> StorageResult<bool>;

    /// Permanently delete every recycled object whose age is at least `days`.
    async fn purge_older_than(&self, days: u32) -> StorageResult<PurgeReport>;

    /// When a recycled object was moved aside: the recorded time in its key, or its
    /// modification time when the key carries none. `None` when the object is missing.
    async fn recycled_at(&self, recycle_path: &str) -> StorageResult<Option<DateTime<Utc>>>;

    /// Check if an object exists
    async fn exists(&self, storage_path: &str) -> StorageResult<bool>;

    /// Get the size in bytes of an object, if it exists.
    async fn content_length(&self, storage_path: &str) -> StorageResult<u64>;

    /// Total bytes in the active tree (per category) and in the recycle area.
    async fn usage(&self) -> StorageResult<StorageUsage>;
}

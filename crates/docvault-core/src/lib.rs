//! Docvault Core Library
//!
//! This crate provides the domain models, error types, configuration and validation
//! shared by every docvault component: the storage layer, the metadata store, the
//! lifecycle controller and the reconciliation synchronizer.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod validation;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    ApprovalStatus, CallerContext, CategoryUsage, Collection, CollectionRef, CollectionView,
    CreateCollectionRequest, DuplicatePolicy, FileEdit, FileFilters, FileRecord, FileStatus,
    RecordSet, RecycleBinInfo, StorageSummary, UploadRequest,
};

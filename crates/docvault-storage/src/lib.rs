//! Docvault Storage Library
//!
//! This crate owns the physical bytes of the vault: the `Storage` trait, the local
//! filesystem implementation, and the naming rules for logical and physical names.
//!
//! # Storage key format
//!
//! Keys are `/`-separated paths relative to the managed root:
//!
//! - **Active, no category**: `{name}_{timestamp}.{ext}`
//! - **Active, with category**: `{category}/{name}_{timestamp}.{ext}`
//! - **Recycled**: `{recycle_dir}/{moved_at}/{original key}`
//!
//! Keys must not contain `..` or a leading `/`. Key generation is centralized in the
//! `keys` module.

pub mod factory;
pub mod keys;
pub mod local;
pub mod naming;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use local::LocalStorage;
pub use naming::{check_duplicate, generate_unique_name};
pub use traits::{
    CategoryBytes, PurgeReport, RecycledObject, SavedObject, Storage, StorageError,
    StorageResult, StorageUsage,
};

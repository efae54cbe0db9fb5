//! Data models for the vault
//!
//! This module contains the records persisted in the metadata documents and the
//! request and reporting types exchanged with the lifecycle controller.

mod caller;
mod collection;
mod file;
mod storage;

// Re-export all models for convenient imports
pub use caller::*;
pub use collection::*;
pub use file::*;
pub use storage::*;

//! Docvault Metadata Layer
//!
//! This crate provides the metadata store for file and collection records and the
//! repositories the lifecycle controller uses to read and mutate them.

// Module declarations
pub mod db;

// Re-exports: Repositories
pub use db::{CollectionRepository, FileRepository};

// Re-exports: Documents and transactions
pub use db::{
    CollectionsDocument, FilesDocument, JsonDocument, MetadataStore, MetadataTransaction,
};

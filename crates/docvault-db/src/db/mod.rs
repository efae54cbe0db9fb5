//! Metadata store and repositories
//!
//! The store persists two JSON documents (files and collections) and serializes writers
//! through transactions. Repositories expose the read/modify/write primitives over them,
//! each with a `_tx` variant for use inside an open transaction.

pub mod collections;
pub mod document;
pub mod files;
pub mod transaction;

pub use collections::CollectionRepository;
pub use document::{CollectionsDocument, FilesDocument, JsonDocument};
pub use files::FileRepository;
pub use transaction::{MetadataStore, MetadataTransaction};

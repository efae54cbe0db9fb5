//! Docvault document lifecycle
//!
//! `DocumentController` is the command and query surface presentation layers use. It
//! keeps the storage layer and the metadata store consistent across the file state
//! machine (active, soft deleted, permanently deleted) and collection membership.

pub mod controller;
pub mod outcome;
pub mod permissions;
pub mod summary;

pub use controller::DocumentController;
pub use outcome::CommandOutcome;

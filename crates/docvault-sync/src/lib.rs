//! Docvault reconciliation synchronizer
//!
//! Presentation layers keep their lists in step with the controller by applying ordered
//! patch operations instead of reloading wholesale. `Reconciler` computes the operations
//! for one surface; `SyncHub` keeps one reconciler per registered surface and publishes
//! each batch on a broadcast channel.

pub mod feed;
pub mod hub;
pub mod patch;
pub mod reconciler;
pub mod surface;

pub use feed::{ActiveFiles, Collections, DeletedFiles, ListSource};
pub use hub::{PatchBatch, SyncHub};
pub use patch::{PatchOp, Trackable};
pub use reconciler::Reconciler;
pub use surface::{PresentationSurface, VecSurface};

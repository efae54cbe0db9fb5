use docvault_core::models::format_record_time;
use docvault_core::{CollectionView, FileRecord};
use serde::Serialize;

/// An item a surface can track by key
///
/// The whole item is the attribute snapshot: two items with the same key that compare
/// unequal are a modification.
pub trait Trackable: Clone + PartialEq {
    /// Stable key, or `None` when one cannot be determined.
    fn key(&self) -> Option<String>;
}

/// Active records are keyed by filename; soft-deleted ones by filename and deletion
/// time, since names repeat across deletion history.
impl Trackable for FileRecord {
    fn key(&self) -> Option<String> {
        if self.filename.is_empty() {
            return None;
        }
        Some(match self.deleted_at.as_ref() {
            Some(at) => format!("{}#{}", self.filename, format_record_time(at)),
            None => self.filename.clone(),
        })
    }
}

impl Trackable for CollectionView {
    fn key(&self) -> Option<String> {
        Some(self.id.to_string())
    }
}

/// One ordered edit to a presentation surface
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PatchOp<T> {
    Remove { key: String, position: usize },
    Update { key: String, position: usize, item: T },
    Insert { key: String, position: usize, item: T },
    /// Replace the whole surface; the fallback when keys are unusable.
    Reset { items: Vec<T> },
}

impl<T> PatchOp<T> {
    pub fn key(&self) -> Option<&str> {
        match self {
            PatchOp::Remove { key, .. }
            | PatchOp::Update { key, .. }
            | PatchOp::Insert { key, .. } => Some(key),
            PatchOp::Reset { .. } => None,
        }
    }
}

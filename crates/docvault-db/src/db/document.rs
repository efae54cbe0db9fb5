//! JSON document persistence
//!
//! Each document is read and written whole. A missing, empty or unparsable document is
//! replaced by its empty default; writes go to a sibling temp file that is synced and
//! renamed over the original.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use docvault_core::{AppError, Collection, FileRecord, RecordSet};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// `files_data.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilesDocument {
    #[serde(default)]
    pub uploaded_files: Vec<FileRecord>,
    #[serde(default)]
    pub deleted_files: Vec<FileRecord>,
}

impl FilesDocument {
    pub fn records(&self, set: RecordSet) -> &Vec<FileRecord> {
        match set {
            RecordSet::Active => &self.uploaded_files,
            RecordSet::SoftDeleted => &self.deleted_files,
        }
    }

    pub fn records_mut(&mut self, set: RecordSet) -> &mut Vec<FileRecord> {
        match set {
            RecordSet::Active => &mut self.uploaded_files,
            RecordSet::SoftDeleted => &mut self.deleted_files,
        }
    }

    /// Find a record by id in either set.
    pub fn find_by_id_mut(&mut self, id: &uuid::Uuid) -> Option<&mut FileRecord> {
        self.uploaded_files
            .iter_mut()
            .chain(self.deleted_files.iter_mut())
            .find(|r| r.id == *id)
    }
}

/// `collections_data.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionsDocument {
    #[serde(default)]
    pub collections: Vec<Collection>,
    /// Highest id ever issued, so ids of deleted collections are never handed out again.
    #[serde(default)]
    pub last_id: i64,
}

impl CollectionsDocument {
    /// `max(existing ids, last issued id, 0) + 1`
    pub fn next_id(&self) -> i64 {
        self.collections
            .iter()
            .map(|c| c.id)
            .max()
            .unwrap_or(0)
            .max(self.last_id)
            .max(0)
            + 1
    }
}

/// A whole-document JSON file
#[derive(Debug, Clone)]
pub struct JsonDocument<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonDocument<T>
where
    T: DeserializeOwned + Serialize + Default,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document, substituting the empty default when it is absent or unusable.
    pub async fn load(&self) -> T {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    path = %self.path.display(),
                    "Metadata document missing, starting from empty default"
                );
                return T::default();
            }
            Err(e) => {
                tracing::error!(
                    path = %self.path.display(),
                    error = %e,
                    "Metadata document unreadable, substituting empty default"
                );
                return T::default();
            }
        };

        if raw.iter().all(u8::is_ascii_whitespace) {
            tracing::warn!(
                path = %self.path.display(),
                "Metadata document empty, substituting empty default"
            );
            return T::default();
        }

        match serde_json::from_slice(&raw) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Metadata document failed to parse, substituting empty default"
                );
                T::default()
            }
        }
    }

    /// Persist the whole document atomically.
    pub async fn save(&self, value: &T) -> Result<(), AppError> {
        let start = std::time::Instant::now();
        let data = serde_json::to_vec_pretty(value)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                AppError::Persistence(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let tmp = self.path.with_extension("json.tmp");
        let result: Result<(), std::io::Error> = async {
            let mut file = fs::File::create(&tmp).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
            fs::rename(&tmp, &self.path).await
        }
        .await;

        if let Err(e) = result {
            let _ = fs::remove_file(&tmp).await;
            return Err(AppError::Persistence(format!(
                "Failed to write {}: {}",
                self.path.display(),
                e
            )));
        }

        tracing::debug!(
            path = %self.path.display(),
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Metadata document saved"
        );
        Ok(())
    }
}

//! Metadata transactions
//!
//! The metadata store serializes every writer behind one async lock. A transaction loads
//! both documents, exposes them for mutation and writes back only the documents that
//! changed when committed. A commit either persists every changed document or none: when
//! the second write fails the first is put back. Dropping a transaction without
//! committing discards its changes.
//!
//! # Example
//!
//! ```ignore
//! use docvault_db::MetadataStore;
//!
//! async fn example(store: &MetadataStore) -> Result<(), docvault_core::AppError> {
//!     let mut tx = store.begin().await;
//!     tx.files_mut().uploaded_files.clear();
//!     tx.commit().await
//! }
//! ```

use std::path::Path;

use docvault_core::constants::{COLLECTIONS_DOCUMENT, FILES_DOCUMENT};
use docvault_core::{AppError, FileStatus};
use tokio::sync::{Mutex, MutexGuard};

use super::document::{CollectionsDocument, FilesDocument, JsonDocument};

/// Transactional access to the files and collections documents
#[derive(Debug)]
pub struct MetadataStore {
    files: JsonDocument<FilesDocument>,
    collections: JsonDocument<CollectionsDocument>,
    writer: Mutex<()>,
}

impl MetadataStore {
    /// Open the documents under `data_dir`, normalising legacy content once.
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self, AppError> {
        let data_dir = data_dir.as_ref();
        tokio::fs::create_dir_all(data_dir).await.map_err(|e| {
            AppError::Persistence(format!(
                "Failed to create data directory {}: {}",
                data_dir.display(),
                e
            ))
        })?;

        let store = Self {
            files: JsonDocument::new(data_dir.join(FILES_DOCUMENT)),
            collections: JsonDocument::new(data_dir.join(COLLECTIONS_DOCUMENT)),
            writer: Mutex::new(()),
        };

        let tx = store.begin().await;
        if tx.is_dirty() {
            tracing::info!(
                data_dir = %data_dir.display(),
                "Normalised legacy metadata documents"
            );
        }
        tx.commit().await?;

        Ok(store)
    }

    /// Begin a transaction, waiting for any other writer to finish.
    pub async fn begin(&self) -> MetadataTransaction<'_> {
        let guard = self.writer.lock().await;
        let mut files = self.files.load().await;
        let mut collections = self.collections.load().await;
        let files_on_disk = files.clone();
        let (files_dirty, collections_dirty) = normalize(&mut files, &mut collections, true);

        MetadataTransaction {
            _guard: guard,
            store: self,
            files_on_disk,
            files,
            collections,
            files_dirty,
            collections_dirty,
            finished: false,
        }
    }

    /// Snapshot of the files document. Does not wait for writers.
    ///
    /// Records missing an id keep the nil id here; ids are only assigned under the writer
    /// lock, where they are persisted with the next commit.
    pub async fn read_files(&self) -> FilesDocument {
        let mut files = self.files.load().await;
        let mut collections = CollectionsDocument::default();
        normalize(&mut files, &mut collections, false);
        files
    }

    /// Snapshot of the collections document. Does not wait for writers.
    pub async fn read_collections(&self) -> CollectionsDocument {
        let mut collections = self.collections.load().await;
        for collection in &mut collections.collections {
            collection.legacy_files.clear();
        }
        collections
    }

    /// Run `f` inside a transaction; commit on `Ok`, discard on `Err`.
    pub async fn update<R, F>(&self, f: F) -> Result<R, AppError>
    where
        F: FnOnce(&mut MetadataTransaction<'_>) -> Result<R, AppError>,
    {
        let mut tx = self.begin().await;
        match f(&mut tx) {
            Ok(result) => {
                tx.commit().await?;
                Ok(result)
            }
            Err(e) => {
                tx.rollback();
                Err(e)
            }
        }
    }
}

/// Both documents loaded under the writer lock
pub struct MetadataTransaction<'a> {
    _guard: MutexGuard<'a, ()>,
    store: &'a MetadataStore,
    /// Files document as loaded, written back if the collections write fails.
    files_on_disk: FilesDocument,
    files: FilesDocument,
    collections: CollectionsDocument,
    files_dirty: bool,
    collections_dirty: bool,
    finished: bool,
}

impl<'a> MetadataTransaction<'a> {
    pub fn files(&self) -> &FilesDocument {
        &self.files
    }

    /// Mutable files document; marks it for write-back.
    pub fn files_mut(&mut self) -> &mut FilesDocument {
        self.files_dirty = true;
        &mut self.files
    }

    pub fn collections(&self) -> &CollectionsDocument {
        &self.collections
    }

    /// Mutable collections document; marks it for write-back.
    pub fn collections_mut(&mut self) -> &mut CollectionsDocument {
        self.collections_dirty = true;
        &mut self.collections
    }

    /// Both documents mutably at once; marks both for write-back.
    pub fn documents_mut(&mut self) -> (&mut FilesDocument, &mut CollectionsDocument) {
        self.files_dirty = true;
        self.collections_dirty = true;
        (&mut self.files, &mut self.collections)
    }

    pub fn is_dirty(&self) -> bool {
        self.files_dirty || self.collections_dirty
    }

    /// Commit the transaction
    ///
    /// Writes the files document first, then the collections document. If the second
    /// write fails the files document is restored, so on `Err` nothing has changed on disk
    /// unless the restore itself failed, which is logged.
    pub async fn commit(mut self) -> Result<(), AppError> {
        self.finished = true;
        if self.files_dirty {
            self.store.files.save(&self.files).await?;
        }
        if self.collections_dirty {
            if let Err(e) = self.store.collections.save(&self.collections).await {
                if self.files_dirty {
                    self.restore_files().await;
                }
                return Err(e);
            }
        }
        Ok(())
    }

    async fn restore_files(&self) {
        match self.store.files.save(&self.files_on_disk).await {
            Ok(()) => tracing::warn!(
                path = %self.store.files.path().display(),
                "Collections write failed, files document restored"
            ),
            Err(e) => tracing::error!(
                error = %e,
                path = %self.store.files.path().display(),
                "Collections write failed and files document could not be restored"
            ),
        }
    }

    /// Discard every change made through this transaction.
    pub fn rollback(mut self) {
        self.finished = true;
    }
}

impl Drop for MetadataTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished && self.is_dirty() {
            tracing::warn!(
                "Metadata transaction was dropped without explicit commit or rollback - discarding changes"
            );
        }
    }
}

/// Bring legacy documents to the current shape. Returns (files changed, collections changed).
///
/// - records without an id get one, when `assign_ids` is set
/// - record status follows the set the record lives in
/// - collections that embed record copies are converted to id references, matching
///   copies to canonical records by filename and storage path
fn normalize(
    files: &mut FilesDocument,
    collections: &mut CollectionsDocument,
    assign_ids: bool,
) -> (bool, bool) {
    let mut files_dirty = false;
    let mut collections_dirty = false;

    for record in files.uploaded_files.iter_mut() {
        files_dirty |= assign_ids && record.ensure_id();
        if record.status != FileStatus::Active {
            record.status = FileStatus::Active;
            files_dirty = true;
        }
    }
    for record in files.deleted_files.iter_mut() {
        files_dirty |= assign_ids && record.ensure_id();
        if record.status != FileStatus::SoftDeleted {
            record.status = FileStatus::SoftDeleted;
            files_dirty = true;
        }
    }

    let highest = collections.collections.iter().map(|c| c.id).max().unwrap_or(0);
    if highest > collections.last_id {
        collections.last_id = highest;
        collections_dirty = true;
    }

    for collection in collections.collections.iter_mut() {
        if collection.legacy_files.is_empty() {
            continue;
        }
        collections_dirty = true;

        for copy in std::mem::take(&mut collection.legacy_files) {
            let canonical = files
                .uploaded_files
                .iter_mut()
                .chain(files.deleted_files.iter_mut())
                .find(|r| r.filename == copy.filename && r.file_path == copy.file_path);

            match canonical {
                Some(record) => {
                    if !collection.file_ids.contains(&record.id) {
                        collection.file_ids.push(record.id);
                    }
                    if record.collection_id.is_none() {
                        record.collection_id = Some(collection.id);
                        files_dirty = true;
                    }
                }
                None => {
                    tracing::warn!(
                        collection = %collection.name,
                        filename = %copy.filename,
                        "Dropping embedded collection entry with no matching file record"
                    );
                }
            }
        }
    }

    (files_dirty, collections_dirty)
}

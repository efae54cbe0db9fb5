//! Document lifecycle controller
//!
//! Orchestrates the storage layer and the metadata store so the two stay consistent
//! across upload, soft delete, restore, permanent delete, the retention sweep and
//! collection membership. Every mutation runs inside one metadata transaction that is
//! held across the physical I/O it has to agree with; bytes that only become garbage
//! after a commit are removed afterwards, best effort.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use docvault_core::constants::SECONDS_PER_DAY;
use docvault_core::models::{normalize_category, now_record_time};
use docvault_core::validation::{validate_category, validate_collection_name, validate_file_name};
use docvault_core::{
    AppError, ApprovalStatus, CallerContext, Collection, CollectionRef, CollectionView, Config,
    CreateCollectionRequest, DuplicatePolicy, FileEdit, FileFilters, FileRecord, RecordSet,
    RecycleBinInfo, StorageSummary, UploadRequest,
};
use docvault_db::{CollectionRepository, FileRepository, MetadataStore, MetadataTransaction};
use docvault_storage::{check_duplicate, create_storage, generate_unique_name, Storage};
use validator::Validate;

use crate::outcome::CommandOutcome;
use crate::permissions;
use crate::summary;

/// Discard `tx` and fail with `err`.
fn abort<T>(tx: MetadataTransaction<'_>, err: AppError) -> Result<T, AppError> {
    tx.rollback();
    Err(err)
}

/// Logical name for an upload: the requested name, or the source file stem, without
/// any extension.
fn base_name(request: &UploadRequest) -> Result<String, AppError> {
    let raw = match request.desired_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => request
            .source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| AppError::Validation("No source file selected".to_string()))?,
    };
    let (stem, _) = docvault_storage::keys::split_extension(&raw);
    let stem = stem.trim().to_string();
    validate_file_name(&stem)?;
    Ok(stem)
}

/// Lifecycle state machine over the storage layer and the metadata store
#[derive(Clone)]
pub struct DocumentController {
    config: Config,
    storage: Arc<dyn Storage>,
    store: Arc<MetadataStore>,
    files: FileRepository,
    collections: CollectionRepository,
}

impl DocumentController {
    pub fn new(config: Config, storage: Arc<dyn Storage>, store: Arc<MetadataStore>) -> Self {
        Self {
            files: FileRepository::new(store.clone()),
            collections: CollectionRepository::new(store.clone()),
            config,
            storage,
            store,
        }
    }

    /// Build the storage backend and open the metadata store from `config`, then run the
    /// retention sweep once when enabled.
    pub async fn start(config: Config) -> Result<Self, AppError> {
        config.validate()?;
        let storage = create_storage(&config).await?;
        let store = Arc::new(MetadataStore::open(config.data_dir()).await?);
        let controller = Self::new(config, storage, store);

        if controller.config.cleanup_on_start() {
            let outcome = controller
                .cleanup_recycle_bin(controller.config.retention_days())
                .await;
            tracing::info!(
                success = outcome.success,
                count = outcome.payload.unwrap_or(0),
                retention_days = controller.config.retention_days(),
                "Startup retention sweep finished"
            );
        }

        Ok(controller)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    fn admin_role(&self) -> &str {
        self.config.admin_role()
    }

    // ==================== QUERIES ====================

    /// Active records visible to the caller, narrowed by `filters`.
    #[tracing::instrument(skip(self, filters), fields(user = %caller.username))]
    pub async fn list_files(&self, caller: &CallerContext, filters: &FileFilters) -> Vec<FileRecord> {
        self.files
            .get_all(RecordSet::Active)
            .await
            .into_iter()
            .filter(|r| permissions::visible_to(caller, r, self.admin_role()))
            .filter(|r| filters.matches(r))
            .collect()
    }

    /// Soft-deleted records visible to the caller.
    #[tracing::instrument(skip(self), fields(user = %caller.username))]
    pub async fn list_deleted_files(&self, caller: &CallerContext) -> Vec<FileRecord> {
        self.files
            .get_all(RecordSet::SoftDeleted)
            .await
            .into_iter()
            .filter(|r| permissions::visible_to(caller, r, self.admin_role()))
            .collect()
    }

    /// The active record named `filename`, optionally pinned to its upload time.
    pub async fn get_file_details(
        &self,
        caller: &CallerContext,
        filename: &str,
        timestamp: Option<&DateTime<Utc>>,
    ) -> Option<FileRecord> {
        self.list_files(caller, &FileFilters::default())
            .await
            .into_iter()
            .find(|r| r.filename == filename && r.uploaded_at_matches(timestamp))
    }

    /// A soft-deleted record with its age and the days left before the retention sweep
    /// removes it.
    pub async fn get_recycle_bin_file_info(
        &self,
        caller: &CallerContext,
        filename: &str,
        deleted_at: Option<&DateTime<Utc>>,
    ) -> Option<RecycleBinInfo> {
        let record = self
            .list_deleted_files(caller)
            .await
            .into_iter()
            .find(|r| r.filename == filename && r.deleted_at_matches(deleted_at))?;

        let recycled_at = match record.recycle_bin_path.as_deref() {
            Some(path) => self.storage.recycled_at(path).await.unwrap_or_else(|e| {
                tracing::warn!(error = %e, recycle_path = %path, "Failed to read recycle object age");
                None
            }),
            None => None,
        };
        let age_days = recycled_at
            .or(record.deleted_at)
            .map(|at| (Utc::now() - at).num_seconds().max(0) / SECONDS_PER_DAY)
            .unwrap_or(0);

        Some(RecycleBinInfo::new(
            record,
            age_days,
            self.config.retention_days(),
        ))
    }

    /// Every collection with its active members resolved.
    pub async fn list_collections(&self) -> Vec<CollectionView> {
        let active = self.files.get_all(RecordSet::Active).await;
        self.collections.views(&active).await
    }

    pub async fn get_collection(&self, reference: &CollectionRef) -> Option<CollectionView> {
        let collection = self.collections.get(reference).await?;
        let active = self.files.get_all(RecordSet::Active).await;
        Some(CollectionView::resolve(&collection, &active))
    }

    /// Active members of a collection, in membership order.
    pub async fn files_in_collection(&self, reference: &CollectionRef) -> Option<Vec<FileRecord>> {
        self.get_collection(reference).await.map(|view| view.files)
    }

    pub fn can_edit(&self, caller: &CallerContext, record: &FileRecord) -> bool {
        permissions::can_edit(caller, record, self.admin_role())
    }

    pub fn can_delete(&self, caller: &CallerContext, record: &FileRecord) -> bool {
        permissions::can_delete(caller, record, self.admin_role())
    }

    /// Record counts plus measured byte usage.
    #[tracing::instrument(skip(self))]
    pub async fn storage_summary(&self) -> Result<StorageSummary, AppError> {
        let files = self.store.read_files().await;
        let collections = self.store.read_collections().await;
        let usage = self.storage.usage().await?;
        Ok(summary::summarize(
            &files,
            &collections,
            usage,
            self.config.storage_quota_bytes(),
        ))
    }

    // ==================== UPLOAD ====================

    /// Store a new file, resolving a name collision with the request's policy.
    #[tracing::instrument(skip(self, request), fields(user = %caller.username, source = %request.source_path.display()))]
    pub async fn upload(
        &self,
        caller: &CallerContext,
        request: UploadRequest,
    ) -> CommandOutcome<FileRecord> {
        match self.upload_inner(caller, request).await {
            Ok((record, message)) => CommandOutcome::ok(message, record),
            Err(e) => CommandOutcome::failure(&e),
        }
    }

    async fn upload_inner(
        &self,
        caller: &CallerContext,
        request: UploadRequest,
    ) -> Result<(FileRecord, String), AppError> {
        let start = std::time::Instant::now();
        request.validate()?;
        let name = base_name(&request)?;
        let category = normalize_category(request.category.as_deref());
        if let Some(category) = category.as_deref() {
            validate_category(category)?;
        }

        let mut tx = self.store.begin().await;

        if let Some(reference) = request.collection.as_ref() {
            if self.collections.get_tx(&tx, reference).is_none() {
                return abort(
                    tx,
                    AppError::NotFound(format!("Collection {} not found", reference)),
                );
            }
        }

        let collides = check_duplicate(
            tx.files().uploaded_files.iter().map(|r| r.filename.as_str()),
            &name,
        );
        let (final_name, replaced) = match (collides, request.policy) {
            (false, _) => (name, None),
            (true, DuplicatePolicy::Cancel) => {
                return abort(
                    tx,
                    AppError::DuplicateName(format!("A file named '{}' already exists", name)),
                );
            }
            (true, DuplicatePolicy::Override) => {
                let forbidden = self
                    .files
                    .find_tx(&tx, RecordSet::Active, |r| r.filename == name)
                    .is_some_and(|old| !self.can_delete(caller, old));
                if forbidden {
                    return abort(
                        tx,
                        AppError::Forbidden(format!(
                            "You do not have permission to replace '{}'",
                            name
                        )),
                    );
                }
                let removed = self
                    .files
                    .remove_tx(&mut tx, RecordSet::Active, |r| r.filename == name);
                (name, removed.into_iter().next())
            }
            (true, DuplicatePolicy::Rename) => {
                let active = &tx.files().uploaded_files;
                let unique = generate_unique_name(&name, |candidate| {
                    check_duplicate(active.iter().map(|r| r.filename.as_str()), candidate)
                });
                (unique, None)
            }
        };

        let saved = match self
            .storage
            .save(&request.source_path, &final_name, category.as_deref())
            .await
        {
            Ok(saved) => saved,
            Err(e) => return abort(tx, e.into()),
        };

        let record = FileRecord {
            id: uuid::Uuid::new_v4(),
            filename: saved.final_name.clone(),
            extension: saved.extension.clone(),
            file_path: saved.storage_path.clone(),
            category,
            collection_id: None,
            description: request
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            uploader: caller.username.clone(),
            role: caller.primary_role().to_string(),
            timestamp: now_record_time(),
            status: Default::default(),
            approval_status: ApprovalStatus::Pending,
            deleted_at: None,
            deleted_by: None,
            recycle_bin_path: None,
        };
        let membership = request
            .collection
            .clone()
            .or_else(|| replaced.as_ref()?.collection_id.map(CollectionRef::Id));

        let staged = self.stage_upload(&mut tx, record, membership.as_ref(), replaced.as_ref());
        let record = match staged {
            Ok(record) => record,
            Err(e) => {
                tx.rollback();
                self.discard_saved(&saved.storage_path).await;
                return Err(e);
            }
        };
        if let Err(e) = tx.commit().await {
            if self.persisted_in(RecordSet::Active, record.id).await {
                tracing::error!(
                    filename = %record.filename,
                    key = %record.file_path,
                    "Upload commit failed after its record was written; keeping the bytes"
                );
            } else {
                self.discard_saved(&saved.storage_path).await;
            }
            return Err(e);
        }

        if let Some(old) = replaced.as_ref().filter(|old| !old.file_path.is_empty()) {
            if let Err(e) = self.storage.delete(&old.file_path).await {
                tracing::error!(
                    error = %e,
                    key = %old.file_path,
                    "Failed to remove replaced file bytes; continuing"
                );
            }
        }

        tracing::info!(
            filename = %record.filename,
            key = %record.file_path,
            size_bytes = saved.size_bytes,
            replaced = replaced.is_some(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "File uploaded"
        );

        let mut message = "File uploaded successfully".to_string();
        if collides {
            if replaced.is_some() {
                message.push_str(" (previous version replaced)");
            } else {
                message.push_str(&format!(" as '{}'", record.filename));
            }
        }
        Ok((record, message))
    }

    /// Insert the uploaded record and its membership inside `tx`.
    fn stage_upload(
        &self,
        tx: &mut MetadataTransaction<'_>,
        record: FileRecord,
        membership: Option<&CollectionRef>,
        replaced: Option<&FileRecord>,
    ) -> Result<FileRecord, AppError> {
        if let Some(old) = replaced {
            self.collections.forget_member_tx(tx, old.id);
        }
        let record = self.files.add_tx(tx, RecordSet::Active, record)?;
        match membership {
            Some(reference) => {
                self.collections.add_member_tx(tx, reference, record.id)?;
                self.files
                    .find_tx(tx, RecordSet::Active, |r| r.id == record.id)
                    .cloned()
                    .ok_or_else(|| {
                        AppError::Internal(format!("Uploaded record {} vanished", record.id))
                    })
            }
            None => Ok(record),
        }
    }

    /// Whether the record `id` is in `set` on disk; checked after a commit reports failure.
    async fn persisted_in(&self, set: RecordSet, id: uuid::Uuid) -> bool {
        self.store
            .read_files()
            .await
            .records(set)
            .iter()
            .any(|r| r.id == id)
    }

    async fn discard_saved(&self, key: &str) {
        if let Err(e) = self.storage.delete(key).await {
            tracing::error!(error = %e, key = %key, "Failed to remove bytes of a rejected upload");
        }
    }

    // ==================== DELETE / RESTORE ====================

    /// Move an active file to the recycle bin.
    #[tracing::instrument(skip(self), fields(user = %caller.username))]
    pub async fn delete_file(
        &self,
        caller: &CallerContext,
        filename: &str,
        timestamp: Option<&DateTime<Utc>>,
    ) -> CommandOutcome<FileRecord> {
        let result = self.soft_delete(caller, filename, timestamp).await;
        CommandOutcome::from_result(result, |_| {
            format!("File '{}' moved to recycle bin", filename)
        })
    }

    async fn soft_delete(
        &self,
        caller: &CallerContext,
        filename: &str,
        timestamp: Option<&DateTime<Utc>>,
    ) -> Result<FileRecord, AppError> {
        let mut tx = self.store.begin().await;
        let found = self
            .files
            .find_tx(&tx, RecordSet::Active, |r| {
                r.filename == filename && r.uploaded_at_matches(timestamp)
            })
            .cloned();
        let Some(record) = found else {
            return abort(
                tx,
                AppError::NotFound(format!("File '{}' not found", filename)),
            );
        };
        if !self.can_delete(caller, &record) {
            return abort(
                tx,
                AppError::Forbidden(format!(
                    "You do not have permission to delete '{}'",
                    filename
                )),
            );
        }

        let (recycle_path, deleted_at) = if record.file_path.is_empty() {
            (None, now_record_time())
        } else {
            match self.storage.move_to_recycle_bin(&record.file_path).await {
                Ok(recycled) => (Some(recycled.recycle_path), recycled.deleted_at),
                Err(e) => {
                    return abort(
                        tx,
                        AppError::Io(format!("Failed to move file to recycle bin: {}", e)),
                    );
                }
            }
        };

        let deleted_by = caller.username.clone();
        let stamped_path = recycle_path.clone();
        let migrated = self.files.migrate_tx(
            &mut tx,
            RecordSet::Active,
            RecordSet::SoftDeleted,
            |r| r.id == record.id,
            |r| match stamped_path {
                Some(path) => r.mark_soft_deleted(&deleted_by, deleted_at, path),
                None => {
                    r.deleted_at = Some(deleted_at);
                    r.deleted_by = Some(deleted_by.clone());
                }
            },
        );
        let moved = match migrated {
            Ok(Some(moved)) => moved,
            Ok(None) => {
                tx.rollback();
                self.undo_recycle(recycle_path.as_deref(), &record.file_path).await;
                return Err(AppError::Internal(format!(
                    "File record {} disappeared during delete",
                    record.id
                )));
            }
            Err(e) => {
                tx.rollback();
                self.undo_recycle(recycle_path.as_deref(), &record.file_path).await;
                return Err(e);
            }
        };

        if let Err(e) = tx.commit().await {
            if self.persisted_in(RecordSet::SoftDeleted, record.id).await {
                tracing::error!(
                    filename = %record.filename,
                    "Delete commit failed after its record was written; leaving bytes recycled"
                );
            } else {
                self.undo_recycle(recycle_path.as_deref(), &record.file_path).await;
            }
            return Err(e);
        }

        tracing::info!(
            filename = %moved.filename,
            recycle_path = moved.recycle_bin_path.as_deref().unwrap_or_default(),
            "File moved to recycle bin"
        );
        Ok(moved)
    }

    /// Put recycled bytes back after the metadata side of a delete failed.
    async fn undo_recycle(&self, recycle_path: Option<&str>, original_path: &str) {
        let Some(recycle_path) = recycle_path else {
            return;
        };
        if let Err(e) = self
            .storage
            .restore_from_recycle_bin(recycle_path, original_path)
            .await
        {
            tracing::error!(
                error = %e,
                recycle_path = %recycle_path,
                key = %original_path,
                "Failed to return bytes after an aborted delete"
            );
        }
    }

    /// Move a soft-deleted file back to the active set.
    #[tracing::instrument(skip(self), fields(user = %caller.username))]
    pub async fn restore_file(
        &self,
        caller: &CallerContext,
        filename: &str,
        deleted_at: Option<&DateTime<Utc>>,
    ) -> CommandOutcome<FileRecord> {
        let result = self.restore(caller, filename, deleted_at).await;
        CommandOutcome::from_result(result, |_| {
            format!("File '{}' restored successfully", filename)
        })
    }

    async fn restore(
        &self,
        caller: &CallerContext,
        filename: &str,
        deleted_at: Option<&DateTime<Utc>>,
    ) -> Result<FileRecord, AppError> {
        let mut tx = self.store.begin().await;
        let found = self
            .files
            .find_tx(&tx, RecordSet::SoftDeleted, |r| {
                r.filename == filename && r.deleted_at_matches(deleted_at)
            })
            .cloned();
        let Some(record) = found else {
            return abort(
                tx,
                AppError::NotFound(format!("File '{}' not found in deleted files", filename)),
            );
        };
        if !self.can_delete(caller, &record) {
            return abort(
                tx,
                AppError::Forbidden(format!(
                    "You do not have permission to restore '{}'",
                    filename
                )),
            );
        }
        if self
            .files
            .find_tx(&tx, RecordSet::Active, |r| r.filename == filename)
            .is_some()
        {
            return abort(
                tx,
                AppError::DuplicateName(format!(
                    "Cannot restore '{}': an active file with that name exists",
                    filename
                )),
            );
        }

        let restored = match self.files.migrate_tx(
            &mut tx,
            RecordSet::SoftDeleted,
            RecordSet::Active,
            |r| r.id == record.id,
            FileRecord::clear_deletion,
        ) {
            Ok(Some(restored)) => restored,
            Ok(None) => {
                return abort(
                    tx,
                    AppError::Internal(format!(
                        "File record {} disappeared during restore",
                        record.id
                    )),
                );
            }
            Err(e) => return abort(tx, e),
        };

        if let Some(recycle_path) = record.recycle_bin_path.as_deref() {
            if !record.file_path.is_empty() {
                if let Err(e) = self
                    .storage
                    .restore_from_recycle_bin(recycle_path, &record.file_path)
                    .await
                {
                    return abort(
                        tx,
                        AppError::Io(format!("Failed to restore file from recycle bin: {}", e)),
                    );
                }
            }
        }

        if let Err(e) = tx.commit().await {
            tracing::error!(
                error = %e,
                filename = %filename,
                key = %record.file_path,
                "Restored bytes but failed to persist the record; the record still lists the recycle path"
            );
            return Err(e);
        }

        tracing::info!(filename = %restored.filename, key = %restored.file_path, "File restored");
        Ok(restored)
    }

    /// Remove a soft-deleted record and purge its bytes.
    ///
    /// The record is removed even when the bytes cannot be purged.
    #[tracing::instrument(skip(self), fields(user = %caller.username))]
    pub async fn permanently_delete_file(
        &self,
        caller: &CallerContext,
        filename: &str,
        deleted_at: Option<&DateTime<Utc>>,
    ) -> CommandOutcome<FileRecord> {
        let result = self.purge_record(caller, filename, deleted_at).await;
        CommandOutcome::from_result(result, |_| {
            format!("File '{}' permanently deleted", filename)
        })
    }

    async fn purge_record(
        &self,
        caller: &CallerContext,
        filename: &str,
        deleted_at: Option<&DateTime<Utc>>,
    ) -> Result<FileRecord, AppError> {
        let mut tx = self.store.begin().await;
        let found = self
            .files
            .find_tx(&tx, RecordSet::SoftDeleted, |r| {
                r.filename == filename && r.deleted_at_matches(deleted_at)
            })
            .cloned();
        let Some(record) = found else {
            return abort(
                tx,
                AppError::NotFound(format!("File '{}' not found in deleted files", filename)),
            );
        };
        if !self.can_delete(caller, &record) {
            return abort(
                tx,
                AppError::Forbidden(format!(
                    "You do not have permission to delete '{}'",
                    filename
                )),
            );
        }

        self.files
            .remove_tx(&mut tx, RecordSet::SoftDeleted, |r| r.id == record.id);
        self.collections.forget_member_tx(&mut tx, record.id);
        tx.commit().await?;

        if let Some(recycle_path) = record.recycle_bin_path.as_deref() {
            match self.storage.permanently_delete(recycle_path).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!(
                        recycle_path = %recycle_path,
                        "Recycle object already missing during permanent delete"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        recycle_path = %recycle_path,
                        "Failed to purge recycle object; record removed anyway"
                    );
                }
            }
        }

        tracing::info!(filename = %record.filename, "File permanently deleted");
        Ok(record)
    }

    /// Retention sweep: purge recycle objects at least `days` old and drop their records.
    ///
    /// Soft-deleted records without bytes age by their deletion time.
    #[tracing::instrument(skip(self))]
    pub async fn cleanup_recycle_bin(&self, days: u32) -> CommandOutcome<usize> {
        let result = self.sweep(days).await;
        CommandOutcome::from_result(result, |count| {
            if *count > 0 {
                format!(
                    "Automatically cleaned up {} old file(s) from recycle bin",
                    count
                )
            } else {
                "No old files to cleanup".to_string()
            }
        })
    }

    async fn sweep(&self, days: u32) -> Result<usize, AppError> {
        let start = std::time::Instant::now();
        let report = self
            .storage
            .purge_older_than(days)
            .await
            .map_err(|e| AppError::Io(format!("Error during cleanup: {}", e)))?;
        if !report.failed_paths.is_empty() {
            tracing::warn!(
                failed = report.failed_paths.len(),
                "Some recycle objects could not be purged"
            );
        }

        let purged: HashSet<&str> = report.purged_paths.iter().map(String::as_str).collect();
        let threshold = i64::from(days) * SECONDS_PER_DAY;
        let now = Utc::now();
        let expired = |r: &FileRecord| match r.recycle_bin_path.as_deref() {
            Some(path) => purged.contains(path),
            None => r
                .deleted_at
                .is_some_and(|at| (now - at).num_seconds() >= threshold),
        };

        let removed = self
            .store
            .update(|tx| {
                let removed = self.files.remove_tx(tx, RecordSet::SoftDeleted, expired);
                for record in &removed {
                    self.collections.forget_member_tx(tx, record.id);
                }
                Ok(removed)
            })
            .await?;

        let count = report.count.max(removed.len());
        tracing::info!(
            count,
            records_removed = removed.len(),
            objects_purged = report.count,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Recycle bin cleanup completed"
        );
        Ok(count)
    }

    // ==================== COLLECTIONS ====================

    #[tracing::instrument(skip(self, request), fields(user = %caller.username, name = %request.name))]
    pub async fn create_collection(
        &self,
        caller: &CallerContext,
        request: CreateCollectionRequest,
    ) -> CommandOutcome<Collection> {
        let result: Result<Collection, AppError> = async {
            request.validate()?;
            validate_collection_name(&request.name)?;
            self.collections
                .create(&request.name, request.icon.as_deref(), &caller.username)
                .await
        }
        .await;
        CommandOutcome::from_result(result, |c| {
            format!("Collection '{}' created successfully", c.name)
        })
    }

    /// Delete a collection; its members stay where they are and lose the association.
    #[tracing::instrument(skip(self))]
    pub async fn delete_collection(&self, reference: &CollectionRef) -> CommandOutcome<Collection> {
        let result = self.collections.delete(reference).await;
        CommandOutcome::from_result(result, |c| {
            format!("Collection '{}' deleted successfully", c.name)
        })
    }

    /// Make `record` a member of the collection.
    ///
    /// The record is matched against the active set by id, or by filename and storage path.
    /// A record that is not active yet is inserted first, provided its bytes are stored and
    /// its name is free.
    #[tracing::instrument(skip(self, record), fields(filename = %record.filename))]
    pub async fn add_file_to_collection(
        &self,
        reference: &CollectionRef,
        record: &FileRecord,
    ) -> CommandOutcome<CollectionView> {
        match self.add_member(reference, record).await {
            Ok((view, true)) => {
                let message = format!("File added to collection '{}'", view.name);
                CommandOutcome::ok(message, view)
            }
            Ok((view, false)) => {
                let message = format!(
                    "File '{}' is already in collection '{}'",
                    record.filename, view.name
                );
                CommandOutcome::ok(message, view)
            }
            Err(e) => CommandOutcome::failure(&e),
        }
    }

    async fn add_member(
        &self,
        reference: &CollectionRef,
        record: &FileRecord,
    ) -> Result<(CollectionView, bool), AppError> {
        let mut tx = self.store.begin().await;
        if self.collections.get_tx(&tx, reference).is_none() {
            return abort(
                tx,
                AppError::NotFound(format!("Collection {} not found", reference)),
            );
        }

        let existing = self
            .files
            .find_tx(&tx, RecordSet::Active, |r| {
                (!record.id.is_nil() && r.id == record.id)
                    || (r.filename == record.filename && r.file_path == record.file_path)
            })
            .map(|r| r.id);
        let id = match existing {
            Some(id) => id,
            None => match self.adopt_record(&mut tx, record).await {
                Ok(id) => id,
                Err(e) => return abort(tx, e),
            },
        };

        let added = match self.collections.add_member_tx(&mut tx, reference, id) {
            Ok(added) => added,
            Err(e) => return abort(tx, e),
        };
        let view = match self.collections.get_tx(&tx, reference) {
            Some(collection) => CollectionView::resolve(collection, &tx.files().uploaded_files),
            None => {
                return abort(
                    tx,
                    AppError::NotFound(format!("Collection {} not found", reference)),
                );
            }
        };
        tx.commit().await?;
        Ok((view, added))
    }

    /// Insert a record that arrived outside an upload into the active set.
    async fn adopt_record(
        &self,
        tx: &mut MetadataTransaction<'_>,
        record: &FileRecord,
    ) -> Result<uuid::Uuid, AppError> {
        let recycled = !record.id.is_nil()
            && self
                .files
                .find_tx(tx, RecordSet::SoftDeleted, |r| r.id == record.id)
                .is_some();
        if recycled {
            return Err(AppError::Validation(format!(
                "File '{}' is in the recycle bin; restore it first",
                record.filename
            )));
        }
        validate_file_name(&record.filename)?;
        if record.file_path.is_empty() || !self.storage.exists(&record.file_path).await? {
            return Err(AppError::NotFound(format!(
                "No stored content for file '{}'",
                record.filename
            )));
        }

        let mut adopted = record.clone();
        adopted.collection_id = None;
        adopted.clear_deletion();
        let adopted = self.files.add_tx(tx, RecordSet::Active, adopted)?;
        tracing::info!(
            filename = %adopted.filename,
            key = %adopted.file_path,
            "Added file record to the active set"
        );
        Ok(adopted.id)
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_file_from_collection(
        &self,
        reference: &CollectionRef,
        filename: &str,
    ) -> CommandOutcome<CollectionView> {
        let result = self
            .store
            .update(|tx| {
                let collection = self.collections.get_tx(tx, reference).cloned().ok_or_else(|| {
                    AppError::NotFound(format!("Collection {} not found", reference))
                })?;
                let files = tx.files();
                let member = files
                    .uploaded_files
                    .iter()
                    .chain(files.deleted_files.iter())
                    .find(|r| r.filename == filename && collection.contains(&r.id))
                    .map(|r| r.id)
                    .ok_or_else(|| {
                        AppError::NotFound(format!("File '{}' not found in collection", filename))
                    })?;
                self.collections.remove_member_tx(tx, reference, member)?;
                let collection = self.collections.get_tx(tx, reference).ok_or_else(|| {
                    AppError::NotFound(format!("Collection {} not found", reference))
                })?;
                Ok(CollectionView::resolve(
                    collection,
                    &tx.files().uploaded_files,
                ))
            })
            .await;
        CommandOutcome::from_result(result, |view| {
            format!("File removed from collection '{}'", view.name)
        })
    }

    // ==================== DETAILS ====================

    /// Change the review state of an active file. Administrators only.
    #[tracing::instrument(skip(self), fields(user = %caller.username))]
    pub async fn set_approval_status(
        &self,
        caller: &CallerContext,
        filename: &str,
        status: ApprovalStatus,
    ) -> CommandOutcome<FileRecord> {
        let result = if caller.is_admin(self.admin_role()) {
            self.update_active(filename, None, |r| r.approval_status = status)
                .await
        } else {
            Err(AppError::Forbidden(
                "Only administrators can review uploads".to_string(),
            ))
        };
        CommandOutcome::from_result(result, |r| {
            format!("File '{}' marked as {}", r.filename, status.as_str())
        })
    }

    /// Edit the description of an active file.
    #[tracing::instrument(skip(self, edit), fields(user = %caller.username))]
    pub async fn edit_file(
        &self,
        caller: &CallerContext,
        filename: &str,
        timestamp: Option<&DateTime<Utc>>,
        edit: FileEdit,
    ) -> CommandOutcome<FileRecord> {
        let result: Result<FileRecord, AppError> = async {
            edit.validate()?;
            let record = self
                .get_file_details(caller, filename, timestamp)
                .await
                .ok_or_else(|| AppError::NotFound(format!("File '{}' not found", filename)))?;
            if !self.can_edit(caller, &record) {
                return Err(AppError::Forbidden(format!(
                    "You do not have permission to edit '{}'",
                    filename
                )));
            }
            let description = edit
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string);
            self.update_active(filename, timestamp, |r| r.description = description)
                .await
        }
        .await;
        CommandOutcome::from_result(result, |r| {
            format!("File '{}' updated successfully", r.filename)
        })
    }

    async fn update_active<M>(
        &self,
        filename: &str,
        timestamp: Option<&DateTime<Utc>>,
        mutator: M,
    ) -> Result<FileRecord, AppError>
    where
        M: FnOnce(&mut FileRecord),
    {
        self.store
            .update(|tx| {
                let matches = |r: &FileRecord| r.filename == filename && r.uploaded_at_matches(timestamp);
                let mut mutator = Some(mutator);
                let updated = self.files.update_in_place_tx(tx, RecordSet::Active, matches, |r| {
                    if let Some(mutate) = mutator.take() {
                        mutate(r);
                    }
                });
                if updated == 0 {
                    return Err(AppError::NotFound(format!("File '{}' not found", filename)));
                }
                self.files
                    .find_tx(tx, RecordSet::Active, matches)
                    .cloned()
                    .ok_or_else(|| AppError::NotFound(format!("File '{}' not found", filename)))
            })
            .await
    }
}

use std::sync::Arc;

use chrono::{DateTime, Utc};
use docvault_core::constants::DEFAULT_COLLECTION_ICON;
use docvault_core::{AppError, Collection, CollectionRef, CollectionView, FileRecord};
use uuid::Uuid;

use super::transaction::{MetadataStore, MetadataTransaction};

/// Repository for collections and their membership
///
/// A collection stores member file ids only; each member record carries the
/// collection id back. Both sides are updated in the same transaction.
#[derive(Clone)]
pub struct CollectionRepository {
    store: Arc<MetadataStore>,
}

impl CollectionRepository {
    pub fn new(store: Arc<MetadataStore>) -> Self {
        Self { store }
    }

    /// List all collections
    #[tracing::instrument(skip(self), fields(db.table = "collections", db.operation = "select"))]
    pub async fn list(&self) -> Vec<Collection> {
        self.store.read_collections().await.collections
    }

    /// Get a collection by id or case-insensitive name
    #[tracing::instrument(skip(self), fields(db.table = "collections", db.operation = "select"))]
    pub async fn get(&self, reference: &CollectionRef) -> Option<Collection> {
        self.list().await.into_iter().find(|c| c.matches(reference))
    }

    /// Every collection with members resolved against the active set
    pub async fn views(&self, active: &[FileRecord]) -> Vec<CollectionView> {
        self.list()
            .await
            .iter()
            .map(|c| CollectionView::resolve(c, active))
            .collect()
    }

    pub fn get_tx<'t>(
        &self,
        tx: &'t MetadataTransaction<'_>,
        reference: &CollectionRef,
    ) -> Option<&'t Collection> {
        tx.collections()
            .collections
            .iter()
            .find(|c| c.matches(reference))
    }

    fn require_tx(
        &self,
        tx: &MetadataTransaction<'_>,
        reference: &CollectionRef,
    ) -> Result<i64, AppError> {
        self.get_tx(tx, reference)
            .map(|c| c.id)
            .ok_or_else(|| AppError::NotFound(format!("Collection {} not found", reference)))
    }

    /// Create a new collection
    ///
    /// Fails with `DuplicateName` when a collection with the same name (ignoring case)
    /// exists. Ids are `max + 1` over every id ever issued.
    #[tracing::instrument(skip(self, tx), fields(db.table = "collections", db.operation = "insert"))]
    pub fn create_tx(
        &self,
        tx: &mut MetadataTransaction<'_>,
        name: &str,
        icon: Option<&str>,
        created_by: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Collection, AppError> {
        let name = name.trim();
        if tx.collections().collections.iter().any(|c| c.name_matches(name)) {
            return Err(AppError::DuplicateName(format!(
                "Collection '{}' already exists",
                name
            )));
        }

        let id = tx.collections().next_id();
        let collection = Collection {
            id,
            name: name.to_string(),
            icon: icon
                .map(str::trim)
                .filter(|i| !i.is_empty())
                .unwrap_or(DEFAULT_COLLECTION_ICON)
                .to_string(),
            created_by: Some(created_by.to_string()).filter(|c| !c.is_empty()),
            created_at,
            file_ids: Vec::new(),
            legacy_files: Vec::new(),
        };

        let doc = tx.collections_mut();
        doc.collections.push(collection.clone());
        doc.last_id = id;
        Ok(collection)
    }

    /// Delete a collection and detach its members
    ///
    /// Member records lose their collection id; their own state is untouched.
    #[tracing::instrument(skip(self, tx), fields(db.table = "collections", db.operation = "delete"))]
    pub fn delete_tx(
        &self,
        tx: &mut MetadataTransaction<'_>,
        reference: &CollectionRef,
    ) -> Result<Collection, AppError> {
        let id = self.require_tx(tx, reference)?;
        let (files, collections) = tx.documents_mut();

        let idx = collections
            .collections
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Collection {} not found", reference)))?;
        let removed = collections.collections.remove(idx);

        for record in files
            .uploaded_files
            .iter_mut()
            .chain(files.deleted_files.iter_mut())
        {
            if record.collection_id == Some(id) || removed.file_ids.contains(&record.id) {
                record.collection_id = None;
            }
        }

        Ok(removed)
    }

    /// Make `file_id` a member of the referenced collection
    ///
    /// A file belongs to at most one collection, so it leaves any other collection first.
    /// Returns false when it was already a member.
    #[tracing::instrument(skip(self, tx), fields(db.table = "collections", db.operation = "add_member"))]
    pub fn add_member_tx(
        &self,
        tx: &mut MetadataTransaction<'_>,
        reference: &CollectionRef,
        file_id: Uuid,
    ) -> Result<bool, AppError> {
        let id = self.require_tx(tx, reference)?;
        let (files, collections) = tx.documents_mut();

        let record = files.find_by_id_mut(&file_id).ok_or_else(|| {
            AppError::NotFound(format!("File record {} not found", file_id))
        })?;
        record.collection_id = Some(id);

        let mut added = false;
        for collection in collections.collections.iter_mut() {
            if collection.id == id {
                if !collection.contains(&file_id) {
                    collection.file_ids.push(file_id);
                    added = true;
                }
            } else {
                collection.file_ids.retain(|f| *f != file_id);
            }
        }
        Ok(added)
    }

    /// Remove `file_id` from the referenced collection. Returns false when it was not a member.
    #[tracing::instrument(skip(self, tx), fields(db.table = "collections", db.operation = "remove_member"))]
    pub fn remove_member_tx(
        &self,
        tx: &mut MetadataTransaction<'_>,
        reference: &CollectionRef,
        file_id: Uuid,
    ) -> Result<bool, AppError> {
        let id = self.require_tx(tx, reference)?;
        let is_member = self
            .get_tx(tx, reference)
            .is_some_and(|c| c.contains(&file_id));
        if !is_member {
            return Ok(false);
        }

        let (files, collections) = tx.documents_mut();
        if let Some(collection) = collections.collections.iter_mut().find(|c| c.id == id) {
            collection.file_ids.retain(|f| *f != file_id);
        }
        if let Some(record) = files.find_by_id_mut(&file_id) {
            if record.collection_id == Some(id) {
                record.collection_id = None;
            }
        }
        Ok(true)
    }

    /// Drop `file_id` from every collection, used when its record is purged.
    pub fn forget_member_tx(&self, tx: &mut MetadataTransaction<'_>, file_id: Uuid) {
        let is_member = tx
            .collections()
            .collections
            .iter()
            .any(|c| c.contains(&file_id));
        if is_member {
            for collection in tx.collections_mut().collections.iter_mut() {
                collection.file_ids.retain(|f| *f != file_id);
            }
        }
    }

    /// Create a collection in its own transaction
    pub async fn create(
        &self,
        name: &str,
        icon: Option<&str>,
        created_by: &str,
    ) -> Result<Collection, AppError> {
        let created_at = docvault_core::models::now_record_time();
        self.store
            .update(|tx| self.create_tx(tx, name, icon, created_by, created_at))
            .await
    }

    /// Delete a collection in its own transaction
    pub async fn delete(&self, reference: &CollectionRef) -> Result<Collection, AppError> {
        self.store.update(|tx| self.delete_tx(tx, reference)).await
    }
}

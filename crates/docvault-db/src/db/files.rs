use std::sync::Arc;

use docvault_core::{AppError, FileRecord, FileStatus, RecordSet};

use super::transaction::{MetadataStore, MetadataTransaction};

/// Repository for file records in the active and soft-deleted sets
#[derive(Clone)]
pub struct FileRepository {
    store: Arc<MetadataStore>,
}

impl FileRepository {
    pub fn new(store: Arc<MetadataStore>) -> Self {
        Self { store }
    }

    /// All records of one set, in document order
    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select"))]
    pub async fn get_all(&self, set: RecordSet) -> Vec<FileRecord> {
        let mut files = self.store.read_files().await;
        std::mem::take(files.records_mut(set))
    }

    /// Filenames of every active record
    pub async fn active_names(&self) -> Vec<String> {
        self.get_all(RecordSet::Active)
            .await
            .into_iter()
            .map(|r| r.filename)
            .collect()
    }

    /// First record of `set` matching `predicate`
    pub fn find_tx<'t, P>(
        &self,
        tx: &'t MetadataTransaction<'_>,
        set: RecordSet,
        predicate: P,
    ) -> Option<&'t FileRecord>
    where
        P: Fn(&FileRecord) -> bool,
    {
        tx.files().records(set).iter().find(|r| predicate(r))
    }

    /// Append a record to `set`.
    ///
    /// Fails with `DuplicateName` when inserting into the active set under a filename an
    /// active record already uses, and with `Internal` when the id is present in either set.
    #[tracing::instrument(skip(self, tx, record), fields(db.table = "files", db.operation = "insert", filename = %record.filename))]
    pub fn add_tx(
        &self,
        tx: &mut MetadataTransaction<'_>,
        set: RecordSet,
        mut record: FileRecord,
    ) -> Result<FileRecord, AppError> {
        record.ensure_id();
        let files = tx.files();
        if files
            .uploaded_files
            .iter()
            .chain(files.deleted_files.iter())
            .any(|r| r.id == record.id)
        {
            return Err(AppError::Internal(format!(
                "File record {} is already stored",
                record.id
            )));
        }
        if set == RecordSet::Active
            && files
                .uploaded_files
                .iter()
                .any(|r| r.filename == record.filename)
        {
            return Err(AppError::DuplicateName(format!(
                "A file named '{}' already exists",
                record.filename
            )));
        }

        record.status = match set {
            RecordSet::Active => FileStatus::Active,
            RecordSet::SoftDeleted => FileStatus::SoftDeleted,
        };
        tx.files_mut().records_mut(set).push(record.clone());
        Ok(record)
    }

    /// Replace the record with the same id in `set`, or append it.
    #[tracing::instrument(skip(self, tx, record), fields(db.table = "files", db.operation = "upsert", filename = %record.filename))]
    pub fn upsert_tx(
        &self,
        tx: &mut MetadataTransaction<'_>,
        set: RecordSet,
        record: FileRecord,
    ) -> Result<FileRecord, AppError> {
        let position = tx.files().records(set).iter().position(|r| r.id == record.id);
        match position {
            Some(idx) => {
                if set == RecordSet::Active
                    && tx
                        .files()
                        .uploaded_files
                        .iter()
                        .any(|r| r.id != record.id && r.filename == record.filename)
                {
                    return Err(AppError::DuplicateName(format!(
                        "A file named '{}' already exists",
                        record.filename
                    )));
                }
                tx.files_mut().records_mut(set)[idx] = record.clone();
                Ok(record)
            }
            None => self.add_tx(tx, set, record),
        }
    }

    /// Remove every record of `set` matching `predicate`; returns the removed records.
    #[tracing::instrument(skip(self, tx, predicate), fields(db.table = "files", db.operation = "delete"))]
    pub fn remove_tx<P>(
        &self,
        tx: &mut MetadataTransaction<'_>,
        set: RecordSet,
        predicate: P,
    ) -> Vec<FileRecord>
    where
        P: Fn(&FileRecord) -> bool,
    {
        if !tx.files().records(set).iter().any(|r| predicate(r)) {
            return Vec::new();
        }
        let records = tx.files_mut().records_mut(set);
        let (removed, kept): (Vec<_>, Vec<_>) =
            std::mem::take(records).into_iter().partition(|r| predicate(r));
        *records = kept;
        removed
    }

    /// Apply `mutator` to every record of `set` matching `predicate`; returns how many.
    ///
    /// Identity fields are restored after the mutator runs.
    #[tracing::instrument(skip(self, tx, predicate, mutator), fields(db.table = "files", db.operation = "update"))]
    pub fn update_in_place_tx<P, M>(
        &self,
        tx: &mut MetadataTransaction<'_>,
        set: RecordSet,
        predicate: P,
        mut mutator: M,
    ) -> usize
    where
        P: Fn(&FileRecord) -> bool,
        M: FnMut(&mut FileRecord),
    {
        if !tx.files().records(set).iter().any(|r| predicate(r)) {
            return 0;
        }
        let mut count = 0;
        for record in tx.files_mut().records_mut(set).iter_mut() {
            if predicate(&*record) {
                let id = record.id;
                let filename = record.filename.clone();
                mutator(&mut *record);
                record.id = id;
                record.filename = filename;
                count += 1;
            }
        }
        count
    }

    /// Move the first record of `from` matching `predicate` into `to`, applying `mutator`
    /// on the way. `Ok(None)` when nothing matched. On error the record has already left
    /// `from`, so the transaction must be rolled back.
    #[tracing::instrument(skip(self, tx, predicate, mutator), fields(db.table = "files", db.operation = "migrate"))]
    pub fn migrate_tx<P, M>(
        &self,
        tx: &mut MetadataTransaction<'_>,
        from: RecordSet,
        to: RecordSet,
        predicate: P,
        mutator: M,
    ) -> Result<Option<FileRecord>, AppError>
    where
        P: Fn(&FileRecord) -> bool,
        M: FnOnce(&mut FileRecord),
    {
        let Some(idx) = tx.files().records(from).iter().position(|r| predicate(r)) else {
            return Ok(None);
        };
        let mut record = tx.files_mut().records_mut(from).remove(idx);
        mutator(&mut record);
        self.add_tx(tx, to, record).map(Some)
    }

    /// Append a record in its own transaction
    pub async fn add(&self, set: RecordSet, record: FileRecord) -> Result<FileRecord, AppError> {
        self.store.update(|tx| self.add_tx(tx, set, record)).await
    }

    /// Remove matching records in their own transaction
    pub async fn remove<P>(&self, set: RecordSet, predicate: P) -> Result<Vec<FileRecord>, AppError>
    where
        P: Fn(&FileRecord) -> bool,
    {
        self.store
            .update(|tx| Ok(self.remove_tx(tx, set, predicate)))
            .await
    }

    /// Update matching records in their own transaction
    pub async fn update_in_place<P, M>(
        &self,
        set: RecordSet,
        predicate: P,
        mutator: M,
    ) -> Result<usize, AppError>
    where
        P: Fn(&FileRecord) -> bool,
        M: FnMut(&mut FileRecord),
    {
        self.store
            .update(|tx| Ok(self.update_in_place_tx(tx, set, predicate, mutator)))
            .await
    }
}

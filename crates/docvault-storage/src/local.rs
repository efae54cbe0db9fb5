use crate::keys;
use crate::traits::{
    CategoryBytes, PurgeReport, RecycledObject, SavedObject, Storage, StorageError, StorageResult,
    StorageUsage,
};
use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use docvault_core::constants::SECONDS_PER_DAY;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

/// Suffix of the sibling file a save writes before renaming into place.
const PARTIAL_SUFFIX: &str = ".part";

/// Give up looking for a free physical name after this many suffixed attempts.
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Local filesystem storage implementation
#[derive(Clone, Debug)]
pub struct LocalStorage {
    base_path: PathBuf,
    recycle_dir: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Managed root directory (e.g., "./FileStorage")
    /// * `recycle_dir` - Name of the recycle subtree under the root (e.g., ".recycle_bin")
    pub async fn new(
        base_path: impl Into<PathBuf>,
        recycle_dir: impl Into<String>,
    ) -> StorageResult<Self> {
        let base_path = base_path.into();
        let recycle_dir = recycle_dir.into();
        keys::validate_key(&recycle_dir)?;

        fs::create_dir_all(base_path.join(&recycle_dir))
            .await
            .map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to create storage directory {}: {}",
                    base_path.display(),
                    e
                ))
            })?;

        Ok(LocalStorage {
            base_path,
            recycle_dir,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn recycle_dir(&self) -> &str {
        &self.recycle_dir
    }

    fn recycle_root(&self) -> PathBuf {
        self.base_path.join(&self.recycle_dir)
    }

    fn is_recycle_key(&self, key: &str) -> bool {
        keys::recycle_token_of(&self.recycle_dir, key).is_some()
    }

    /// Convert storage key to filesystem path with security validation
    ///
    /// This function validates that the storage key doesn't contain path traversal
    /// sequences that could escape the base storage directory.
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        keys::validate_key(storage_key)?;

        let path = self.base_path.join(storage_key);

        let base_canonical = self.base_path.canonicalize().map_err(|e| {
            StorageError::ConfigError(format!("Failed to canonicalize base path: {}", e))
        })?;

        // Symlinks inside the root may point elsewhere; resolve existing paths.
        if let Ok(canonical) = path.canonicalize() {
            if canonical.strip_prefix(&base_canonical).is_err() {
                return Err(StorageError::InvalidKey(
                    "Storage key resolves outside storage directory".to_string(),
                ));
            }
        }

        Ok(path)
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Remove empty directories from `path`'s parent up to, not including, the recycle root.
    async fn prune_empty_recycle_dirs(&self, path: &Path) {
        let stop = self.recycle_root();
        let mut current = path.parent().map(Path::to_path_buf);
        while let Some(dir) = current {
            if dir == stop || dir.strip_prefix(&stop).is_err() {
                break;
            }
            if fs::remove_dir(&dir).await.is_err() {
                break;
            }
            current = dir.parent().map(Path::to_path_buf);
        }
    }

    async fn pick_destination(
        &self,
        base: &str,
        extension: &str,
        category: Option<&str>,
    ) -> StorageResult<(String, PathBuf)> {
        let now = Utc::now();
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = keys::physical_name(base, extension, now, attempt);
            let key = keys::active_key(category, &name);
            let path = self.key_to_path(&key)?;
            if !fs::try_exists(&path).await.unwrap_or(false) {
                return Ok((key, path));
            }
        }
        Err(StorageError::SaveFailed(format!(
            "No free physical name for '{}' after {} attempts",
            base, MAX_NAME_ATTEMPTS
        )))
    }

    async fn write_into_place(&self, source: &Path, path: &Path) -> StorageResult<u64> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let partial = path.with_file_name(format!(".{}{}", file_name, PARTIAL_SUFFIX));

        let result: StorageResult<u64> = async {
            let size = fs::copy(source, &partial).await.map_err(|e| {
                StorageError::SaveFailed(format!(
                    "Failed to copy {} to {}: {}",
                    source.display(),
                    partial.display(),
                    e
                ))
            })?;

            let file = fs::File::open(&partial).await?;
            file.sync_all().await.map_err(|e| {
                StorageError::SaveFailed(format!("Failed to sync file {}: {}", partial.display(), e))
            })?;

            fs::rename(&partial, path).await.map_err(|e| {
                StorageError::SaveFailed(format!(
                    "Failed to move {} into place: {}",
                    path.display(),
                    e
                ))
            })?;
            Ok(size)
        }
        .await;

        if result.is_err() {
            let _ = fs::remove_file(&partial).await;
        }
        result
    }
}

fn age_in_seconds(moved_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - moved_at).num_seconds()
}

/// Move time of a recycled object: the token in its key, else its modification time.
fn recycled_time(recycle_dir: &str, key: &str, path: &Path) -> Option<DateTime<Utc>> {
    keys::recycle_token_of(recycle_dir, key)
        .and_then(keys::parse_recycle_token)
        .or_else(|| {
            std::fs::metadata(path)
                .and_then(|m| m.modified())
                .ok()
                .map(DateTime::<Utc>::from)
        })
}

fn purge_blocking(base_path: PathBuf, recycle_dir: String, days: u32) -> PurgeReport {
    let recycle_root = base_path.join(&recycle_dir);
    let threshold = i64::from(days) * SECONDS_PER_DAY;
    let now = Utc::now();
    let mut report = PurgeReport::default();

    for entry in WalkDir::new(&recycle_root)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        let Ok(relative) = path.strip_prefix(&base_path) else {
            continue;
        };
        let key = keys::key_from_relative(relative);
        let Some(moved_at) = recycled_time(&recycle_dir, &key, path) else {
            continue;
        };
        if age_in_seconds(moved_at, now) < threshold {
            continue;
        }
        match std::fs::remove_file(path) {
            Ok(()) => report.purged_paths.push(key),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to purge recycled object");
                report.failed_paths.push(key);
            }
        }
    }

    // Drop timestamp directories left empty.
    for entry in WalkDir::new(&recycle_root)
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
    {
        let _ = std::fs::remove_dir(entry.path());
    }

    report.count = report.purged_paths.len();
    report
}

fn usage_blocking(base_path: PathBuf, recycle_dir: String) -> StorageUsage {
    let mut usage = StorageUsage::default();
    let mut categories: BTreeMap<Option<String>, (usize, u64)> = BTreeMap::new();

    for entry in WalkDir::new(&base_path)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let Ok(relative) = entry.path().strip_prefix(&base_path) else {
            continue;
        };
        let key = keys::key_from_relative(relative);
        if key.ends_with(PARTIAL_SUFFIX) {
            continue;
        }
        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);

        let mut parts = key.split('/');
        let first = parts.next().unwrap_or_default();
        if first == recycle_dir {
            usage.recycle_bytes += size;
            continue;
        }
        usage.active_bytes += size;
        let category = parts.next().map(|_| first.to_string());
        let slot = categories.entry(category).or_insert((0, 0));
        slot.0 += 1;
        slot.1 += size;
    }

    usage.categories = categories
        .into_iter()
        .map(|(category, (file_count, bytes))| CategoryBytes {
            category,
            file_count,
            bytes,
        })
        .collect();
    usage
}

#[async_trait]
impl Storage for LocalStorage {
    async fn save(
        &self,
        source: &Path,
        desired_name: &str,
        category: Option<&str>,
    ) -> StorageResult<SavedObject> {
        let start = std::time::Instant::now();

        let source_meta = fs::metadata(source)
            .await
            .map_err(|_| StorageError::SourceNotFound(source.display().to_string()))?;
        if !source_meta.is_file() {
            return Err(StorageError::SourceNotFound(source.display().to_string()));
        }

        let source_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (_, extension) = keys::split_extension(&source_name);
        let extension = extension.to_string();

        let (key, path) = self
            .pick_destination(desired_name, &extension, category)
            .await?;
        self.ensure_parent_dir(&path).await?;
        let size = self.write_into_place(source, &path).await?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage save successful"
        );

        Ok(SavedObject {
            storage_path: key,
            final_name: desired_name.to_string(),
            extension,
            size_bytes: size,
        })
    }

    async fn delete(&self, storage_path: &str) -> StorageResult<()> {
        let path = self.key_to_path(storage_path)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %storage_path,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(())
    }

    async fn move_to_recycle_bin(&self, storage_path: &str) -> StorageResult<RecycledObject> {
        if self.is_recycle_key(storage_path) {
            return Err(StorageError::InvalidKey(format!(
                "'{}' is already in the recycle area",
                storage_path
            )));
        }
        let path = self.key_to_path(storage_path)?;
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(storage_path.to_string()));
        }

        let now = Utc::now();
        let recycle_key = keys::recycle_key(&self.recycle_dir, now, storage_path);
        let recycle_path = self.key_to_path(&recycle_key)?;
        self.ensure_parent_dir(&recycle_path).await?;

        fs::rename(&path, &recycle_path).await.map_err(|e| {
            StorageError::MoveFailed(format!(
                "Failed to move {} to recycle bin: {}",
                path.display(),
                e
            ))
        })?;

        tracing::info!(
            key = %storage_path,
            recycle_key = %recycle_key,
            "Moved file to recycle bin"
        );

        Ok(RecycledObject {
            recycle_path: recycle_key,
            deleted_at: now.with_nanosecond(0).unwrap_or(now),
        })
    }

    async fn restore_from_recycle_bin(
        &self,
        recycle_path: &str,
        original_path: &str,
    ) -> StorageResult<()> {
        let from = self.key_to_path(recycle_path)?;
        let to = self.key_to_path(original_path)?;

        if !fs::try_exists(&from).await.unwrap_or(false) {
            return Err(StorageError::NotFound(recycle_path.to_string()));
        }
        if fs::try_exists(&to).await.unwrap_or(false) {
            return Err(StorageError::MoveFailed(format!(
                "Restore target {} already exists",
                original_path
            )));
        }

        self.ensure_parent_dir(&to).await?;
        fs::rename(&from, &to).await.map_err(|e| {
            StorageError::MoveFailed(format!(
                "Failed to restore {} to {}: {}",
                recycle_path, original_path, e
            ))
        })?;
        self.prune_empty_recycle_dirs(&from).await;

        tracing::info!(
            recycle_key = %recycle_path,
            key = %original_path,
            "Restored file from recycle bin"
        );

        Ok(())
    }

    async fn permanently_delete(&self, recycle_path: &str) -> StorageResult<bool> {
        if !self.is_recycle_key(recycle_path) {
            return Err(StorageError::InvalidKey(format!(
                "'{}' is not in the recycle area",
                recycle_path
            )));
        }
        let path = self.key_to_path(recycle_path)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            tracing::warn!(
                recycle_key = %recycle_path,
                "Recycled object already missing; nothing to delete"
            );
            return Ok(false);
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;
        self.prune_empty_recycle_dirs(&path).await;

        tracing::info!(recycle_key = %recycle_path, "Permanently deleted file");
        Ok(true)
    }

    async fn purge_older_than(&self, days: u32) -> StorageResult<PurgeReport> {
        let start = std::time::Instant::now();
        let base_path = self.base_path.clone();
        let recycle_dir = self.recycle_dir.clone();

        let report = tokio::task::spawn_blocking(move || purge_blocking(base_path, recycle_dir, days))
            .await
            .map_err(|e| StorageError::DeleteFailed(format!("Purge task failed: {}", e)))?;

        tracing::info!(
            days = days,
            count = report.count,
            failed = report.failed_paths.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Recycle bin purge complete"
        );

        Ok(report)
    }

    async fn recycled_at(&self, recycle_path: &str) -> StorageResult<Option<DateTime<Utc>>> {
        let path = self.key_to_path(recycle_path)?;
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }
        let recycle_dir = self.recycle_dir.clone();
        let key = recycle_path.to_string();
        tokio::task::spawn_blocking(move || recycled_time(&recycle_dir, &key, &path))
            .await
            .map_err(|e| StorageError::IoError(std::io::Error::other(e)))
    }

    async fn exists(&self, storage_path: &str) -> StorageResult<bool> {
        let path = self.key_to_path(storage_path)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn content_length(&self, storage_path: &str) -> StorageResult<u64> {
        let path = self.key_to_path(storage_path)?;
        let meta = fs::metadata(&path)
            .await
            .map_err(|_| StorageError::NotFound(storage_path.to_string()))?;
        Ok(meta.len())
    }

    async fn usage(&self) -> StorageResult<StorageUsage> {
        let base_path = self.base_path.clone();
        let recycle_dir = self.recycle_dir.clone();
        tokio::task::spawn_blocking(move || usage_blocking(base_path, recycle_dir))
            .await
            .map_err(|e| StorageError::IoError(std::io::Error::other(e)))
    }
}

use crate::{LocalStorage, Storage, StorageResult};
use docvault_core::Config;
use std::sync::Arc;

/// Create the storage backend for the configured managed root
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    let storage = LocalStorage::new(config.storage_path(), config.recycle_dir()).await?;

    tracing::debug!(
        root = %config.storage_path().display(),
        recycle_dir = %config.recycle_dir(),
        "Local storage ready"
    );

    Ok(Arc::new(storage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_create_storage_creates_recycle_area() {
        let dir = tempdir().unwrap();
        let config = Config::for_root(dir.path());

        let storage = create_storage(&config).await.unwrap();

        assert!(dir.path().join("files").join(".recycle_bin").is_dir());
        assert_eq!(storage.usage().await.unwrap().active_bytes, 0);
    }
}

pub mod fixtures;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use docvault_core::{CallerContext, Config, FileRecord, RecordSet};
use docvault_db::{FileRepository, MetadataStore};
use docvault_lifecycle::DocumentController;
use docvault_storage::{LocalStorage, Storage};
use tempfile::TempDir;

/// Isolated vault rooted in a temp directory
pub struct TestVault {
    pub controller: DocumentController,
    pub store: Arc<MetadataStore>,
    pub config: Config,
    pub _temp_dir: TempDir,
}

impl TestVault {
    /// Directory uploads are read from; separate from the managed root.
    pub fn source_dir(&self) -> PathBuf {
        self._temp_dir.path().join("incoming")
    }

    pub fn storage_root(&self) -> &Path {
        self.config.storage_path()
    }

    pub fn files(&self) -> FileRepository {
        FileRepository::new(self.store.clone())
    }

    pub async fn active(&self) -> Vec<FileRecord> {
        self.files().get_all(RecordSet::Active).await
    }

    pub async fn deleted(&self) -> Vec<FileRecord> {
        self.files().get_all(RecordSet::SoftDeleted).await
    }
}

pub fn admin() -> CallerContext {
    CallerContext::new("root", "admin")
}

pub fn alice() -> CallerContext {
    CallerContext::new("alice", "student")
}

pub fn bob() -> CallerContext {
    CallerContext::new("bob", "faculty-adviser")
}

/// Setup a vault with the default configuration and no startup sweep
pub async fn setup_test_vault() -> TestVault {
    setup_test_vault_with(|config| config.with_cleanup_on_start(false)).await
}

pub async fn setup_test_vault_with<F>(configure: F) -> TestVault
where
    F: FnOnce(Config) -> Config,
{
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config = configure(Config::for_root(temp_dir.path()));
    std::fs::create_dir_all(temp_dir.path().join("incoming")).expect("Failed to create source dir");

    let storage: Arc<dyn Storage> = Arc::new(
        LocalStorage::new(config.storage_path(), config.recycle_dir())
            .await
            .expect("Failed to create storage"),
    );
    let store = Arc::new(
        MetadataStore::open(config.data_dir())
            .await
            .expect("Failed to open metadata store"),
    );
    let controller = DocumentController::new(config.clone(), storage, store.clone());

    TestVault {
        controller,
        store,
        config,
        _temp_dir: temp_dir,
    }
}

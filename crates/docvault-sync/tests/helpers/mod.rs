use std::path::PathBuf;
use std::sync::Arc;

use docvault_core::{CallerContext, Config, FileRecord, UploadRequest};
use docvault_db::MetadataStore;
use docvault_lifecycle::DocumentController;
use docvault_storage::{LocalStorage, Storage};
use tempfile::TempDir;

pub struct TestVault {
    pub controller: DocumentController,
    pub _temp_dir: TempDir,
}

impl TestVault {
    fn source_dir(&self) -> PathBuf {
        self._temp_dir.path().join("incoming")
    }

    /// Upload `name` with default options, asserting success
    pub async fn upload(&self, caller: &CallerContext, name: &str) -> FileRecord {
        let source = self.source_dir().join(name);
        std::fs::write(&source, name.as_bytes()).expect("Failed to write source file");
        let outcome = self
            .controller
            .upload(caller, UploadRequest::new(source))
            .await;
        assert!(outcome.success, "upload failed: {}", outcome.message);
        outcome.payload.expect("upload returned no record")
    }
}

pub fn admin() -> CallerContext {
    CallerContext::new("root", "admin")
}

pub async fn setup_test_vault() -> TestVault {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config = Config::for_root(temp_dir.path()).with_cleanup_on_start(false);
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

    TestVault {
        controller: DocumentController::new(config, storage, store),
        _temp_dir: temp_dir,
    }
}

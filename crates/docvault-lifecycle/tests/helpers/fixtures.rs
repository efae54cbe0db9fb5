use std::path::{Path, PathBuf};

use docvault_core::{CallerContext, FileRecord, UploadRequest};
use walkdir::WalkDir;

use super::TestVault;

/// Write a source file for an upload and return its path
pub fn create_source(vault: &TestVault, name: &str, contents: &[u8]) -> PathBuf {
    let path = vault.source_dir().join(name);
    std::fs::write(&path, contents).expect("Failed to write source file");
    path
}

/// Upload `name` with default options, asserting success
pub async fn upload_ok(vault: &TestVault, caller: &CallerContext, name: &str) -> FileRecord {
    let source = create_source(vault, name, name.as_bytes());
    let outcome = vault
        .controller
        .upload(caller, UploadRequest::new(source))
        .await;
    assert!(outcome.success, "upload failed: {}", outcome.message);
    outcome.payload.expect("upload returned no record")
}

/// Every regular file under `root`, relative and `/` separated, skipping the top-level
/// `skip_dir`
pub fn physical_objects(root: &Path, skip_dir: &str) -> Vec<String> {
    let mut found: Vec<String> = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| e.depth() != 1 || e.file_name() != skip_dir)
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    found.sort();
    found
}

/// Place an object in the recycle area as if it had been moved there at `token`
/// (`YYYYMMDDTHHMMSSfff`); returns its recycle key.
pub fn plant_recycled(vault: &TestVault, token: &str, original_key: &str) -> String {
    let key = format!("{}/{}/{}", vault.config.recycle_dir(), token, original_key);
    let path = vault.storage_root().join(&key);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"old bytes").unwrap();
    key
}

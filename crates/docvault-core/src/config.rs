//! Configuration module
//!
//! This module provides the configuration for the vault: where the managed storage
//! root and the metadata documents live, how long soft-deleted files are retained,
//! which role is administrative and the optional capacity used by the storage summary.

use std::env;
use std::path::{Path, PathBuf};

use crate::constants::{DEFAULT_ADMIN_ROLE, DEFAULT_RECYCLE_DIR, DEFAULT_RETENTION_DAYS};

const DEFAULT_STORAGE_PATH: &str = "./FileStorage";
const DEFAULT_DATA_DIR: &str = "./data";

/// Vault settings loaded from the environment
#[derive(Clone, Debug)]
pub struct VaultConfig {
    pub storage_path: PathBuf,
    pub data_dir: PathBuf,
    pub recycle_dir: String,
    pub retention_days: u32,
    pub admin_role: String,
    pub storage_quota_bytes: Option<u64>,
    pub cleanup_on_start: bool,
    pub environment: String,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<VaultConfig>);

impl Config {
    fn as_vault(&self) -> &VaultConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.as_vault().environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = VaultConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    /// Configuration rooted at a single directory: storage under `<root>/files`,
    /// documents under `<root>/data`, every other setting at its default.
    pub fn for_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Config(Box::new(VaultConfig {
            storage_path: root.join("files"),
            data_dir: root.join("data"),
            recycle_dir: DEFAULT_RECYCLE_DIR.to_string(),
            retention_days: DEFAULT_RETENTION_DAYS,
            admin_role: DEFAULT_ADMIN_ROLE.to_string(),
            storage_quota_bytes: None,
            cleanup_on_start: true,
            environment: "development".to_string(),
        }))
    }

    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.0.retention_days = days;
        self
    }

    pub fn with_storage_quota_bytes(mut self, quota: Option<u64>) -> Self {
        self.0.storage_quota_bytes = quota;
        self
    }

    pub fn with_cleanup_on_start(mut self, enabled: bool) -> Self {
        self.0.cleanup_on_start = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_vault().validate()
    }

    pub fn storage_path(&self) -> &Path {
        &self.as_vault().storage_path
    }

    pub fn data_dir(&self) -> &Path {
        &self.as_vault().data_dir
    }

    pub fn recycle_dir(&self) -> &str {
        &self.as_vault().recycle_dir
    }

    pub fn retention_days(&self) -> u32 {
        self.as_vault().retention_days
    }

    pub fn admin_role(&self) -> &str {
        &self.as_vault().admin_role
    }

    pub fn storage_quota_bytes(&self) -> Option<u64> {
        self.as_vault().storage_quota_bytes
    }

    pub fn cleanup_on_start(&self) -> bool {
        self.as_vault().cleanup_on_start
    }
}

impl VaultConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let storage_quota_bytes = match env::var("DOCVAULT_STORAGE_QUOTA_BYTES") {
            Ok(raw) if !raw.trim().is_empty() => Some(raw.trim().parse::<u64>().map_err(|_| {
                anyhow::anyhow!("DOCVAULT_STORAGE_QUOTA_BYTES must be a valid number of bytes")
            })?),
            _ => None,
        };

        Ok(VaultConfig {
            storage_path: PathBuf::from(
                env::var("DOCVAULT_STORAGE_PATH")
                    .unwrap_or_else(|_| DEFAULT_STORAGE_PATH.to_string()),
            ),
            data_dir: PathBuf::from(
                env::var("DOCVAULT_DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string()),
            ),
            recycle_dir: env::var("DOCVAULT_RECYCLE_DIR")
                .unwrap_or_else(|_| DEFAULT_RECYCLE_DIR.to_string()),
            retention_days: env::var("DOCVAULT_RECYCLE_RETENTION_DAYS")
                .unwrap_or_else(|_| DEFAULT_RETENTION_DAYS.to_string())
                .parse()
                .unwrap_or(DEFAULT_RETENTION_DAYS),
            admin_role: env::var("DOCVAULT_ADMIN_ROLE")
                .unwrap_or_else(|_| DEFAULT_ADMIN_ROLE.to_string()),
            storage_quota_bytes,
            cleanup_on_start: env::var("DOCVAULT_CLEANUP_ON_START")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            environment,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.retention_days == 0 {
            return Err(anyhow::anyhow!(
                "DOCVAULT_RECYCLE_RETENTION_DAYS must be at least 1"
            ));
        }

        if self.admin_role.trim().is_empty() {
            return Err(anyhow::anyhow!("DOCVAULT_ADMIN_ROLE must not be empty"));
        }

        let recycle = self.recycle_dir.trim();
        if recycle.is_empty()
            || recycle.contains('/')
            || recycle.contains('\\')
            || recycle == "."
            || recycle.contains("..")
        {
            return Err(anyhow::anyhow!(
                "DOCVAULT_RECYCLE_DIR must be a single directory name, got '{}'",
                self.recycle_dir
            ));
        }

        if self.storage_path == self.data_dir {
            return Err(anyhow::anyhow!(
                "DOCVAULT_DATA_DIR and DOCVAULT_STORAGE_PATH must be different directories"
            ));
        }

        if self.storage_quota_bytes == Some(0) {
            return Err(anyhow::anyhow!(
                "DOCVAULT_STORAGE_QUOTA_BYTES must be greater than zero when set"
            ));
        }

        Ok(())
    }
}

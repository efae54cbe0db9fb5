use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::file::{now_record_time, record_time, FileRecord};
use crate::constants::DEFAULT_COLLECTION_ICON;

fn default_icon() -> String {
    DEFAULT_COLLECTION_ICON.to_string()
}

/// Named grouping of files. Membership is stored as file ids only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: i64,
    pub name: String,
    #[serde(default = "default_icon")]
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default = "now_record_time", with = "record_time")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub file_ids: Vec<Uuid>,
    /// Embedded record copies from documents written before membership moved to ids.
    /// Drained into `file_ids` when the document is loaded.
    #[serde(default, rename = "files", skip_serializing)]
    pub legacy_files: Vec<FileRecord>,
}

impl Collection {
    pub fn name_matches(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.trim().to_lowercase()
    }

    pub fn matches(&self, reference: &CollectionRef) -> bool {
        match reference {
            CollectionRef::Id(id) => self.id == *id,
            CollectionRef::Name(name) => self.name_matches(name),
        }
    }

    pub fn contains(&self, file_id: &Uuid) -> bool {
        self.file_ids.contains(file_id)
    }
}

/// Lookup key for a collection: numeric id or case-insensitive name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CollectionRef {
    Id(i64),
    Name(String),
}

impl fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionRef::Id(id) => write!(f, "#{}", id),
            CollectionRef::Name(name) => write!(f, "'{}'", name),
        }
    }
}

impl FromStr for CollectionRef {
    type Err = std::convert::Infallible;

    /// All-digit input is an id, anything else a name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Ok(match trimmed.parse::<i64>() {
            Ok(id) => CollectionRef::Id(id),
            Err(_) => CollectionRef::Name(trimmed.to_string()),
        })
    }
}

impl From<i64> for CollectionRef {
    fn from(id: i64) -> Self {
        CollectionRef::Id(id)
    }
}

impl From<&str> for CollectionRef {
    fn from(name: &str) -> Self {
        CollectionRef::Name(name.to_string())
    }
}

/// A collection with its member records resolved against the active set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionView {
    pub id: i64,
    pub name: String,
    pub icon: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(with = "record_time")]
    pub created_at: DateTime<Utc>,
    pub files: Vec<FileRecord>,
}

impl CollectionView {
    /// Resolve member ids in membership order; ids without an active record are skipped.
    pub fn resolve(collection: &Collection, active: &[FileRecord]) -> Self {
        let files = collection
            .file_ids
            .iter()
            .filter_map(|id| active.iter().find(|r| r.id == *id).cloned())
            .collect();
        CollectionView {
            id: collection.id,
            name: collection.name.clone(),
            icon: collection.icon.clone(),
            created_by: collection.created_by.clone(),
            created_at: collection.created_at,
            files,
        }
    }
}

/// Request DTO for creating a new collection
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCollectionRequest {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Collection name must be between 1 and 255 characters"
    ))]
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
}

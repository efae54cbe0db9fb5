use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::collection::CollectionRef;
use crate::constants::NO_CATEGORY;

/// Wall-clock format used for every timestamp stored in the metadata documents.
pub const RECORD_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current time at the precision the documents store (whole seconds).
pub fn now_record_time() -> DateTime<Utc> {
    let now = Utc::now();
    now.with_nanosecond(0).unwrap_or(now)
}

pub fn format_record_time(time: &DateTime<Utc>) -> String {
    time.format(RECORD_TIME_FORMAT).to_string()
}

/// Parse a stored timestamp. Accepts the document format and RFC 3339.
pub fn parse_record_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    chrono::NaiveDateTime::parse_from_str(raw, RECORD_TIME_FORMAT)
        .map(|naive| naive.and_utc())
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
}

/// Serde adapter for `DateTime<Utc>` in the document timestamp format.
pub mod record_time {
    use chrono::{DateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_record_time(time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_record_time(&raw)
            .ok_or_else(|| D::Error::custom(format!("invalid timestamp '{}'", raw)))
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            time: &Option<DateTime<Utc>>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match time {
                Some(time) => super::serialize(time, s),
                None => s.serialize_none(),
            }
        }

        /// Unparsable values are dropped instead of failing the whole document.
        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            let raw = Option::<String>::deserialize(d)?;
            Ok(raw.and_then(|raw| super::super::parse_record_time(&raw)))
        }
    }
}

/// Normalise a caller or document supplied category: blank and the "None" sentinel mean no category.
pub fn normalize_category(category: Option<&str>) -> Option<String> {
    category
        .map(str::trim)
        .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case(NO_CATEGORY))
        .map(str::to_string)
}

fn deserialize_category<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let raw = Option::<String>::deserialize(d)?;
    Ok(normalize_category(raw.as_deref()))
}

/// Lifecycle state of a file record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    #[default]
    Active,
    SoftDeleted,
    PermanentlyDeleted,
}

/// Review state of an uploaded file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Accepted => "accepted",
            ApprovalStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for ApprovalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(ApprovalStatus::Pending),
            "accepted" | "accept" | "approved" => Ok(ApprovalStatus::Accepted),
            "rejected" | "reject" => Ok(ApprovalStatus::Rejected),
            other => Err(format!(
                "Unknown approval status '{}'. Expected pending, accepted or rejected",
                other
            )),
        }
    }
}

/// The two persisted record sets of the files document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordSet {
    /// `uploaded_files`
    Active,
    /// `deleted_files`
    SoftDeleted,
}

/// Metadata for one logical file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Stable identity; nil until the metadata store assigns one to a legacy record.
    #[serde(default)]
    pub id: Uuid,
    /// Display name without extension; unique among active records.
    pub filename: String,
    /// Extension without the leading dot.
    #[serde(default)]
    pub extension: String,
    /// Path relative to the managed storage root, `/` separated.
    #[serde(default)]
    pub file_path: String,
    #[serde(
        default,
        deserialize_with = "deserialize_category",
        skip_serializing_if = "Option::is_none"
    )]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub uploader: String,
    #[serde(default)]
    pub role: String,
    #[serde(default = "now_record_time", with = "record_time")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub status: FileStatus,
    #[serde(default)]
    pub approval_status: ApprovalStatus,
    #[serde(
        default,
        with = "record_time::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recycle_bin_path: Option<String>,
}

impl FileRecord {
    /// Assign an id when the record has none. Returns true if one was assigned.
    pub fn ensure_id(&mut self) -> bool {
        if self.id.is_nil() {
            self.id = Uuid::new_v4();
            true
        } else {
            false
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == FileStatus::Active
    }

    /// True when `timestamp` is absent or equals the upload time.
    pub fn uploaded_at_matches(&self, timestamp: Option<&DateTime<Utc>>) -> bool {
        timestamp.is_none_or(|ts| *ts == self.timestamp)
    }

    /// True when `deleted_at` is absent or equals the recorded deletion time.
    pub fn deleted_at_matches(&self, deleted_at: Option<&DateTime<Utc>>) -> bool {
        deleted_at.is_none_or(|ts| Some(*ts) == self.deleted_at)
    }

    /// Stamp soft-delete metadata.
    pub fn mark_soft_deleted(
        &mut self,
        deleted_by: &str,
        deleted_at: DateTime<Utc>,
        recycle_bin_path: String,
    ) {
        self.status = FileStatus::SoftDeleted;
        self.deleted_at = Some(deleted_at);
        self.deleted_by = Some(deleted_by.to_string());
        self.recycle_bin_path = Some(recycle_bin_path);
    }

    /// Strip soft-delete metadata and mark the record active again.
    pub fn clear_deletion(&mut self) {
        self.status = FileStatus::Active;
        self.deleted_at = None;
        self.deleted_by = None;
        self.recycle_bin_path = None;
    }
}

/// Narrowing applied by file listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileFilters {
    pub category: Option<String>,
    pub extension: Option<String>,
    /// Case-insensitive substring match on filename.
    pub search: Option<String>,
}

impl FileFilters {
    pub fn matches(&self, record: &FileRecord) -> bool {
        if let Some(category) = normalize_category(self.category.as_deref()) {
            if record.category.as_deref() != Some(category.as_str()) {
                return false;
            }
        }
        if let Some(extension) = self.extension.as_deref() {
            let wanted = extension.trim().trim_start_matches('.');
            if !wanted.is_empty() && !record.extension.eq_ignore_ascii_case(wanted) {
                return false;
            }
        }
        if let Some(search) = self.search.as_deref() {
            let needle = search.trim().to_lowercase();
            if !needle.is_empty() && !record.filename.to_lowercase().contains(&needle) {
                return false;
            }
        }
        true
    }
}

/// How an upload resolves a filename that collides with an active record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Fail with a duplicate-name conflict and write nothing.
    #[default]
    Cancel,
    /// Replace the active record and its bytes.
    Override,
    /// Store under the next free `name (n)`.
    Rename,
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cancel" => Ok(DuplicatePolicy::Cancel),
            "override" | "replace" => Ok(DuplicatePolicy::Override),
            "rename" => Ok(DuplicatePolicy::Rename),
            other => Err(format!(
                "Unknown duplicate policy '{}'. Expected cancel, override or rename",
                other
            )),
        }
    }
}

/// Upload command input
#[derive(Debug, Clone, Validate)]
pub struct UploadRequest {
    pub source_path: PathBuf,
    /// Display name to store under; defaults to the source file stem. Any extension is dropped.
    #[validate(length(
        min = 1,
        max = 255,
        message = "File name must be between 1 and 255 characters"
    ))]
    pub desired_name: Option<String>,
    pub category: Option<String>,
    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,
    pub collection: Option<CollectionRef>,
    pub policy: DuplicatePolicy,
}

impl UploadRequest {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            desired_name: None,
            category: None,
            description: None,
            collection: None,
            policy: DuplicatePolicy::default(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.desired_name = Some(name.into());
        self
    }

    pub fn in_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn into_collection(mut self, collection: CollectionRef) -> Self {
        self.collection = Some(collection);
        self
    }

    pub fn with_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Editable details of an active file
#[derive(Debug, Clone, Default, Validate)]
pub struct FileEdit {
    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,
}

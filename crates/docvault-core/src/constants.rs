//! Shared constants

/// Role granted unrestricted access when no override is configured.
pub const DEFAULT_ADMIN_ROLE: &str = "admin";

/// Days a soft-deleted object stays in the recycle area before the retention sweep purges it.
pub const DEFAULT_RETENTION_DAYS: u32 = 15;

/// Name of the recycle subtree under the managed storage root.
pub const DEFAULT_RECYCLE_DIR: &str = ".recycle_bin";

/// Metadata document holding the active and soft-deleted file sets.
pub const FILES_DOCUMENT: &str = "files_data.json";

/// Metadata document holding collection records.
pub const COLLECTIONS_DOCUMENT: &str = "collections_data.json";

/// Icon assigned to collections created without one.
pub const DEFAULT_COLLECTION_ICON: &str = "folder.png";

/// Category value the upload form sends when no category was picked.
pub const NO_CATEGORY: &str = "None";

/// Separator between a caller's primary role and its sub-roles (`student-org_officer`).
pub const SUB_ROLE_SEPARATOR: char = '-';

pub const SECONDS_PER_DAY: i64 = 86_400;

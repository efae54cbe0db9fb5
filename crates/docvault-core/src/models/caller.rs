use serde::{Deserialize, Serialize};

use super::file::FileRecord;
use crate::constants::SUB_ROLE_SEPARATOR;

/// Identity and role of whoever issues a command.
///
/// Roles may carry sub-roles after a `-` (`student-org_officer`); the segment before the
/// first separator is the primary role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerContext {
    pub username: String,
    pub role: String,
}

impl CallerContext {
    pub fn new(username: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            role: role.into(),
        }
    }

    pub fn primary_role(&self) -> &str {
        self.role
            .split(SUB_ROLE_SEPARATOR)
            .next()
            .unwrap_or_default()
            .trim()
    }

    pub fn sub_roles(&self) -> impl Iterator<Item = &str> {
        self.role.split(SUB_ROLE_SEPARATOR).skip(1).map(str::trim)
    }

    pub fn has_sub_role(&self, sub_role: &str) -> bool {
        self.sub_roles().any(|r| r.eq_ignore_ascii_case(sub_role))
    }

    pub fn is_admin(&self, admin_role: &str) -> bool {
        self.primary_role().eq_ignore_ascii_case(admin_role.trim())
    }

    pub fn owns(&self, record: &FileRecord) -> bool {
        record.uploader == self.username
    }
}

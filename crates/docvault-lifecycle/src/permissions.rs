//! Ownership checks for file mutations.

use docvault_core::{CallerContext, FileRecord};

/// Administrators may edit anything; everyone else only what they uploaded.
pub fn can_edit(caller: &CallerContext, record: &FileRecord, admin_role: &str) -> bool {
    caller.is_admin(admin_role) || caller.owns(record)
}

/// Same rule as [`can_edit`]; kept separate so the two can diverge.
pub fn can_delete(caller: &CallerContext, record: &FileRecord, admin_role: &str) -> bool {
    caller.is_admin(admin_role) || caller.owns(record)
}

/// Records the caller may see: all for administrators, own uploads otherwise.
pub fn visible_to(caller: &CallerContext, record: &FileRecord, admin_role: &str) -> bool {
    caller.is_admin(admin_role) || caller.owns(record)
}

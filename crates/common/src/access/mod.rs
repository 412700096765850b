//! Role-based document visibility
//!
//! A document is visible to admins, and otherwise only to principals whose
//! role appears in its `allowed_roles`. A document with no allowed roles is
//! admin-only. Listings apply the same rule in SQL (see `db::query`).

use crate::auth::{Principal, Role};
use crate::db::models::Document;
use crate::errors::{AppError, Result};

/// Whether `principal` may see `document`
pub fn can_access(principal: &Principal, document: &Document) -> bool {
    role_permits(principal.role, document.roles())
}

/// Role check against an allowed-roles list
pub fn role_permits(role: Role, allowed_roles: &[Role]) -> bool {
    role == Role::Admin || allowed_roles.contains(&role)
}

/// Refuse anyone who is not an administrator
pub fn require_admin(principal: &Principal) -> Result<()> {
    if principal.is_admin() {
        Ok(())
    } else {
        tracing::debug!(subject = %principal.subject, role = %principal.role, "Admin operation refused");
        Err(AppError::Forbidden)
    }
}

/// `can_access` as a `Result`
pub fn ensure_access(principal: &Principal, document: &Document) -> Result<()> {
    if can_access(principal, document) {
        Ok(())
    } else {
        tracing::debug!(
            subject = %principal.subject,
            role = %principal.role,
            "Document access refused"
        );
        Err(AppError::Forbidden)
    }
}

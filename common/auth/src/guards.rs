use tracing::warn;

use crate::error::{AuthError, AuthResult};
use crate::identity::Identity;
use crate::roles::{Role, ALL_ROLES};

/// Compile-time role set for [`crate::Authorized`].
pub trait Gate: Send + Sync + 'static {
    const ALLOWED: &'static [Role];
}

/// Any authenticated user.
#[derive(Debug, Clone, Copy)]
pub struct AnyRole;

#[derive(Debug, Clone, Copy)]
pub struct OrganizerOrAdmin;

#[derive(Debug, Clone, Copy)]
pub struct AdminOnly;

impl Gate for AnyRole {
    const ALLOWED: &'static [Role] = ALL_ROLES;
}

impl Gate for OrganizerOrAdmin {
    const ALLOWED: &'static [Role] = &[Role::Organizer, Role::Admin];
}

impl Gate for AdminOnly {
    const ALLOWED: &'static [Role] = &[Role::Admin];
}

/// Role gate. An empty `allowed` set admits nobody.
pub fn require_role(identity: &Identity, allowed: &[Role]) -> AuthResult<()> {
    if allowed.contains(&identity.role) {
        return Ok(());
    }
    warn!(user_id = %identity.user_id, role = %identity.role, ?allowed, "role_check_failed");
    Err(AuthError::InsufficientRole {
        required: allowed.to_vec(),
    })
}

pub fn require_admin(identity: &Identity) -> AuthResult<()> {
    require_role(identity, AdminOnly::ALLOWED)
}

/// Ownership gate: admins always pass, otherwise the subject must match the
/// owner case-insensitively.
pub fn require_owner_or_admin(identity: &Identity, owner: &str) -> AuthResult<()> {
    if identity.is_admin() {
        return Ok(());
    }
    if identity.subject.trim().to_lowercase() == owner.trim().to_lowercase() {
        return Ok(());
    }
    warn!(user_id = %identity.user_id, owner, "ownership_check_failed");
    Err(AuthError::OwnershipViolation)
}

/// Reject deactivated or banned accounts.
pub fn ensure_account_usable(identity: &Identity) -> AuthResult<()> {
    if !identity.active {
        return Err(AuthError::AccountDeactivated);
    }
    if identity.banned {
        return Err(AuthError::AccountBanned);
    }
    Ok(())
}

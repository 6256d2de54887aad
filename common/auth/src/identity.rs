use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};
use uuid::Uuid;

use crate::claims::{normalize_subject, Claims};
use crate::error::{AuthError, AuthResult};
use crate::roles::{canonicalize_role, Role};

/// The resolved principal for a request. `role` always comes from the user
/// store, never from the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub subject: String,
    pub role: Role,
    pub active: bool,
    pub banned: bool,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// The slice of a user record the resolver needs.
#[derive(Debug, Clone)]
pub struct DirectoryUser {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub active: bool,
    pub banned: bool,
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct DirectoryError(pub String);

/// System of record for users, as seen from the auth core.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look up by normalized (lower-case, trimmed) email.
    async fn find_by_subject(&self, subject: &str) -> Result<Option<DirectoryUser>, DirectoryError>;
}

#[derive(Clone)]
pub struct IdentityResolver {
    directory: Arc<dyn UserDirectory>,
}

impl IdentityResolver {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }

    /// One directory read per call. Active/banned flags are reported, not
    /// enforced.
    pub async fn resolve(&self, claims: &Claims) -> AuthResult<Identity> {
        let subject = normalize_subject(&claims.subject);
        let user = self
            .directory
            .find_by_subject(&subject)
            .await
            .map_err(|err| {
                error!(error = %err, "user directory lookup failed");
                AuthError::Directory(err.to_string())
            })?
            .ok_or(AuthError::UnknownSubject)?;

        let role = canonicalize_role(&user.role).map_err(|_| {
            error!(user_id = %user.id, role = %user.role, "stored role is outside the role set");
            AuthError::Directory(format!("user {} has unrecognised role", user.id))
        })?;

        if role != claims.role {
            debug!(
                user_id = %user.id,
                token_role = %claims.role,
                stored_role = %role,
                "stored role differs from token claim; using stored role"
            );
        }

        Ok(Identity {
            user_id: user.id,
            subject: normalize_subject(&user.email),
            role,
            active: user.active,
            banned: user.banned,
        })
    }
}

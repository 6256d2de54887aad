use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Closed set of roles. Raw strings only become a `Role` through
/// [`canonicalize_role`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    Student,
    Organizer,
    Admin,
}

pub const ALL_ROLES: &[Role] = &[Role::Student, Role::Organizer, Role::Admin];

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "STUDENT",
            Role::Organizer => "ORGANIZER",
            Role::Admin => "ADMIN",
        }
    }
}

/// Fold a boundary role string onto the closed set.
///
/// Trims, upper-cases, then applies the alias table (`USER` -> `STUDENT`,
/// `ORGANISER` -> `ORGANIZER`). Canonical spellings map to themselves, so the
/// function is idempotent over `Role::as_str`.
pub fn canonicalize_role(raw: &str) -> AuthResult<Role> {
    let folded = raw.trim().to_uppercase();
    let name = match folded.as_str() {
        "USER" => "STUDENT",
        "ORGANISER" => "ORGANIZER",
        other => other,
    };

    match name {
        "STUDENT" => Ok(Role::Student),
        "ORGANIZER" => Ok(Role::Organizer),
        "ADMIN" => Ok(Role::Admin),
        _ => Err(AuthError::InvalidRole(raw.trim().to_string())),
    }
}

impl FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        canonicalize_role(s)
    }
}

impl TryFrom<String> for Role {
    type Error = AuthError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        canonicalize_role(&value)
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

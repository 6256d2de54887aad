use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};
use crate::roles::{canonicalize_role, Role};

/// Token payload exactly as it travels on the wire.
///
/// `sub`, `role` and `iat` default when absent so that shape problems are
/// reported by [`validate_claims`] rather than as undecodable payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub iat: i64,
    pub exp: i64,
}

/// Validated claims: normalized subject, canonical role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Claims {
    pub subject: String,
    pub role: Role,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl Claims {
    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.expires_at, 0).single()
    }

    pub(crate) fn to_wire(&self) -> TokenClaims {
        TokenClaims {
            sub: self.subject.clone(),
            role: self.role.as_str().to_string(),
            iat: self.issued_at,
            exp: self.expires_at,
        }
    }
}

/// Lower-case, trimmed form of an email-like subject.
pub fn normalize_subject(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Shape checks on decoded claims, kept apart from signature verification.
pub fn validate_claims(raw: TokenClaims) -> AuthResult<Claims> {
    let subject = normalize_subject(&raw.sub);
    if subject.is_empty() {
        return Err(AuthError::InvalidClaims("sub", raw.sub));
    }
    if raw.exp <= raw.iat {
        return Err(AuthError::InvalidClaims(
            "exp",
            format!("{} is not after iat {}", raw.exp, raw.iat),
        ));
    }
    let role = canonicalize_role(&raw.role)?;

    Ok(Claims {
        subject,
        role,
        issued_at: raw.iat,
        expires_at: raw.exp,
    })
}

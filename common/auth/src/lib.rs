//! Bearer-token authentication and authorization for the events API:
//! HS256 token codec, claim validation, identity resolution against the
//! user store, role and ownership gates.

pub mod claims;
pub mod codec;
pub mod config;
pub mod error;
pub mod extractors;
pub mod guards;
pub mod identity;
pub mod roles;

pub use claims::{normalize_subject, validate_claims, Claims, TokenClaims};
pub use codec::{IssuedToken, TokenCodec};
pub use config::{TokenConfig, DEFAULT_TTL_SECONDS, MAX_TTL_SECONDS};
pub use error::{AuthError, AuthResult};
pub use extractors::{AuthContext, Authenticator, Authorized};
pub use guards::{
    ensure_account_usable, require_admin, require_owner_or_admin, require_role, AdminOnly,
    AnyRole, Gate, OrganizerOrAdmin,
};
pub use identity::{DirectoryError, DirectoryUser, Identity, IdentityResolver, UserDirectory};
pub use roles::{canonicalize_role, Role, ALL_ROLES};

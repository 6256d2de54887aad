use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header::AUTHORIZATION, request::Parts, HeaderMap, HeaderValue};
use common_observability::SecurityMetrics;
use tracing::warn;

use crate::claims::validate_claims;
use crate::codec::TokenCodec;
use crate::error::{AuthError, AuthResult};
use crate::guards::{ensure_account_usable, require_role, AnyRole, Gate};
use crate::identity::{Identity, IdentityResolver};

/// The one place requests are authenticated: bearer extraction, signature
/// and expiry, claim shape, identity resolution, account status.
#[derive(Clone)]
pub struct Authenticator {
    codec: TokenCodec,
    resolver: IdentityResolver,
    enforce_account_status: bool,
    metrics: Option<Arc<SecurityMetrics>>,
}

impl Authenticator {
    pub fn new(codec: TokenCodec, resolver: IdentityResolver) -> Self {
        Self {
            codec,
            resolver,
            enforce_account_status: true,
            metrics: None,
        }
    }

    /// When disabled, inactive and banned users keep access until their
    /// token expires; only login refuses them.
    pub fn with_account_status_enforcement(mut self, enforce: bool) -> Self {
        self.enforce_account_status = enforce;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<SecurityMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub async fn authenticate_token(&self, token: &str) -> AuthResult<Identity> {
        let raw = self.codec.verify(token)?;
        let claims = validate_claims(raw)?;
        let identity = self.resolver.resolve(&claims).await?;
        if self.enforce_account_status {
            ensure_account_usable(&identity)?;
        }
        Ok(identity)
    }

    pub async fn authenticate(&self, headers: &HeaderMap) -> AuthResult<Identity> {
        let result = match headers.get(AUTHORIZATION) {
            Some(value) => match bearer_token(value) {
                Some(token) => self.authenticate_token(token).await,
                None => Err(AuthError::MissingToken),
            },
            None => Err(AuthError::MissingToken),
        };
        result.map_err(|err| self.rejected(err))
    }

    /// Authenticate, then apply the role gate `G`.
    pub async fn authorize<G: Gate>(&self, headers: &HeaderMap) -> AuthResult<Identity> {
        let identity = self.authenticate(headers).await?;
        require_role(&identity, G::ALLOWED).map_err(|err| self.rejected(err))?;
        Ok(identity)
    }

    fn rejected(&self, err: AuthError) -> AuthError {
        warn!(reason = err.code(), error = %err, "auth_rejected");
        if let Some(metrics) = &self.metrics {
            metrics.auth_rejected(err.code());
        }
        err
    }
}

/// An identity that has passed authentication and the role gate `G`.
#[derive(Debug, Clone)]
pub struct Authorized<G: Gate = AnyRole> {
    pub identity: Identity,
    _gate: PhantomData<fn() -> G>,
}

/// Authenticated request with no role restriction.
pub type AuthContext = Authorized<AnyRole>;

impl<G: Gate> Authorized<G> {
    pub fn into_identity(self) -> Identity {
        self.identity
    }
}

impl<G: Gate> Deref for Authorized<G> {
    type Target = Identity;

    fn deref(&self) -> &Identity {
        &self.identity
    }
}

#[async_trait]
impl<S, G> FromRequestParts<S> for Authorized<G>
where
    Arc<Authenticator>: FromRef<S>,
    S: Send + Sync,
    G: Gate,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let authenticator = Arc::<Authenticator>::from_ref(state);
        let identity = authenticator.authorize::<G>(&parts.headers).await?;
        Ok(Self {
            identity,
            _gate: PhantomData,
        })
    }
}

/// Token part of an `Authorization: Bearer <token>` value. The scheme is
/// case-insensitive; anything but a single non-empty token is refused.
fn bearer_token(value: &HeaderValue) -> Option<&str> {
    let (scheme, rest) = value.to_str().ok()?.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return None;
    }
    Some(token)
}

use axum::response::{IntoResponse, Response};
use common_http_errors::ApiError;
use thiserror::Error;

use crate::roles::Role;

pub type AuthResult<T> = Result<T, AuthError>;

/// Every way a request can fail to authenticate or authorize. None of these
/// are retried.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authorization header missing or not a bearer token")]
    MissingToken,
    #[error("malformed token: {0}")]
    MalformedToken(String),
    #[error("token signature mismatch")]
    BadSignature,
    #[error("token has expired")]
    TokenExpired,
    #[error("invalid claim '{0}' with value '{1}'")]
    InvalidClaims(&'static str, String),
    #[error("invalid role '{0}'. Valid roles: STUDENT, ORGANIZER, ADMIN")]
    InvalidRole(String),
    #[error("token subject does not match any user")]
    UnknownSubject,
    #[error("insufficient role")]
    InsufficientRole { required: Vec<Role> },
    #[error("only the owner or an admin may perform this action")]
    OwnershipViolation,
    #[error("account deactivated")]
    AccountDeactivated,
    #[error("account banned")]
    AccountBanned,
    #[error("user directory unavailable: {0}")]
    Directory(String),
    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl AuthError {
    /// Stable machine-readable reason, used for the error code header and
    /// the rejection metric label.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::MalformedToken(_) => "malformed_token",
            AuthError::BadSignature => "bad_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::InvalidClaims(_, _) => "invalid_claims",
            AuthError::InvalidRole(_) => "invalid_role",
            AuthError::UnknownSubject => "unknown_subject",
            AuthError::InsufficientRole { .. } => "missing_role",
            AuthError::OwnershipViolation => "ownership_violation",
            AuthError::AccountDeactivated => "account_deactivated",
            AuthError::AccountBanned => "account_banned",
            AuthError::Directory(_) => "user_directory",
            AuthError::Signing(_) => "token_signing",
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(value: AuthError) -> Self {
        let code = value.code();
        match value {
            AuthError::MissingToken
            | AuthError::BadSignature
            | AuthError::TokenExpired
            | AuthError::UnknownSubject => ApiError::Unauthorized {
                code,
                message: Some(value.to_string()),
            },
            AuthError::MalformedToken(_)
            | AuthError::InvalidClaims(_, _)
            | AuthError::InvalidRole(_) => ApiError::BadRequest {
                code,
                message: Some(value.to_string()),
            },
            AuthError::InsufficientRole { required } => ApiError::ForbiddenMissingRole {
                required: required.iter().map(|role| role.as_str().to_string()).collect(),
            },
            AuthError::OwnershipViolation
            | AuthError::AccountDeactivated
            | AuthError::AccountBanned => ApiError::Forbidden {
                code,
                message: Some(value.to_string()),
            },
            // Internal detail stays in the logs.
            AuthError::Directory(_) | AuthError::Signing(_) => ApiError::Internal { message: None },
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use common_auth::{canonicalize_role, normalize_subject, AuthContext, AuthError, Role};
use common_http_errors::{ApiError, ApiResult};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::store::UserRecord;
use crate::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct UserDto {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    pub active: bool,
    pub banned: bool,
}

impl From<&UserRecord> for UserDto {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            active: user.active,
            banned: user.banned,
        }
    }
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub user: UserDto,
}

fn invalid_credentials() -> ApiError {
    ApiError::Unauthorized {
        code: "invalid_credentials",
        message: Some("Invalid credentials".to_string()),
    }
}

fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn issue_response(state: &AppState, user: &UserRecord) -> ApiResult<AuthResponse> {
    let issued = state.codec().issue(&user.email, user.role).map_err(|err| {
        error!(user_id = %user.id, error = %err, "token_issue_failed");
        ApiError::from(err)
    })?;
    let expires_at = issued
        .claims
        .expires_at_utc()
        .ok_or_else(|| ApiError::internal("token expiry out of range"))?;
    Ok(AuthResponse {
        token: issued.token,
        token_type: "Bearer",
        expires_at,
        user: UserDto::from(user),
    })
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let (Some(email), Some(password)) = (required(req.email), required(req.password)) else {
        return Err(ApiError::bad_request(
            "missing_credentials",
            "email and password required",
        ));
    };
    let email = normalize_subject(&email);

    let role = match required(req.role) {
        Some(raw) => canonicalize_role(&raw)?,
        None => Role::Student,
    };

    let password_hash = hash_password(&password)?;
    let user = state
        .users
        .insert(UserRecord::new(email, required(req.name), role, password_hash))
        .await?;

    info!(user_id = %user.id, role = %user.role, "user_registered");
    Ok((StatusCode::CREATED, Json(issue_response(&state, &user)?)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let (Some(email), Some(password)) = (req.email, req.password) else {
        return Err(ApiError::bad_request(
            "missing_credentials",
            "email and password required",
        ));
    };

    let Some(user) = state.users.find_by_email(&normalize_subject(&email)).await? else {
        return Err(invalid_credentials());
    };

    if !verify_password(&password, &user.password_hash) {
        warn!(user_id = %user.id, "login_failed");
        return Err(invalid_credentials());
    }

    if !user.active {
        return Err(AuthError::AccountDeactivated.into());
    }
    if user.banned {
        return Err(AuthError::AccountBanned.into());
    }

    info!(user_id = %user.id, "login_succeeded");
    Ok(Json(issue_response(&state, &user)?))
}

pub async fn me(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<UserDto>> {
    let user = state
        .users
        .find_by_id(auth.user_id)
        .await?
        .ok_or(AuthError::UnknownSubject)?;
    Ok(Json(UserDto::from(&user)))
}

pub(crate) fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| {
            error!(error = %err, "password_hash_failed");
            ApiError::Internal { message: None }
        })
}

fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

use axum::{http::{StatusCode, HeaderValue}, response::{IntoResponse, Response}, Json};
use serde::Serialize;

pub const ERROR_CODE_HEADER: &str = "X-Error-Code";

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")] pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")] pub required_roles: Option<Vec<String>>,
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized { code: &'static str, message: Option<String> },
    ForbiddenMissingRole { required: Vec<String> },
    Forbidden { code: &'static str, message: Option<String> },
    BadRequest { code: &'static str, message: Option<String> },
    NotFound { code: &'static str },
    Conflict { code: &'static str, message: Option<String> },
    Internal { message: Option<String> },
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(e: E) -> Self { Self::Internal { message: Some(e.to_string()) } }
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self { Self::BadRequest { code, message: Some(message.into()) } }
    pub fn not_found(code: &'static str) -> Self { Self::NotFound { code } }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::ForbiddenMissingRole { .. } | ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized { code, .. }
            | ApiError::Forbidden { code, .. }
            | ApiError::BadRequest { code, .. }
            | ApiError::NotFound { code }
            | ApiError::Conflict { code, .. } => *code,
            ApiError::ForbiddenMissingRole { .. } => "missing_role",
            ApiError::Internal { .. } => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_code = self.code();
        let body = match self {
            ApiError::ForbiddenMissingRole { required } => ErrorBody {
                code: error_code.into(),
                message: Some(format!("Insufficient role. Required one of: {}", required.join(", "))),
                required_roles: Some(required),
            },
            ApiError::Unauthorized { message, .. }
            | ApiError::Forbidden { message, .. }
            | ApiError::BadRequest { message, .. }
            | ApiError::Conflict { message, .. }
            | ApiError::Internal { message } => ErrorBody { code: error_code.into(), message, required_roles: None },
            ApiError::NotFound { .. } => ErrorBody { code: error_code.into(), message: None, required_roles: None },
        };
        let mut resp = (status, Json(body)).into_response();
        if let Ok(val) = HeaderValue::from_str(error_code) {
            resp.headers_mut().insert(ERROR_CODE_HEADER, val);
        }
        resp
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

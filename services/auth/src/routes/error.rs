//! HTTP error responses

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::error::AuthError;

/// Error type returned by every handler and middleware
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or invalid access token
    #[error("Unauthorized")]
    Unauthorized,

    /// Authenticated but not holding a required role
    #[error("Forbidden")]
    Forbidden,

    /// Bad request with message
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error
    #[error("Internal server error")]
    InternalServerError,

    /// Failure reported by the account, role or membership core
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl ApiError {
    /// Status code and stable `error_code` for this error
    pub fn status(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "not_authorized"),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::InternalServerError => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            ApiError::Auth(err) => match err {
                AuthError::InvalidUsername
                | AuthError::InvalidEmail
                | AuthError::InvalidPassword
                | AuthError::InvalidRoleName
                | AuthError::InvalidDescription
                | AuthError::PasswordMismatch => (StatusCode::BAD_REQUEST, "bad_request"),
                AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "not_authorized"),
                AuthError::UserNotFound
                | AuthError::RoleNotFound
                | AuthError::RoleAlreadyEmpty
                | AuthError::UserNotHasRole
                | AuthError::MembershipNotFound => (StatusCode::NOT_FOUND, "not_found"),
                AuthError::UserAlreadyExists
                | AuthError::RoleAlreadyExists
                | AuthError::UserAlreadyInRole => (StatusCode::CONFLICT, "conflict"),
                AuthError::Storage(_) | AuthError::Hashing(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status();

        let error_message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error_code": error_code,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Type alias for handler results
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;

    #[test]
    fn test_domain_errors_map_to_statuses() {
        let cases = [
            (AuthError::InvalidUsername, StatusCode::BAD_REQUEST),
            (AuthError::PasswordMismatch, StatusCode::BAD_REQUEST),
            (AuthError::InvalidDescription, StatusCode::BAD_REQUEST),
            (AuthError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (AuthError::UserNotFound, StatusCode::NOT_FOUND),
            (AuthError::RoleAlreadyEmpty, StatusCode::NOT_FOUND),
            (AuthError::UserNotHasRole, StatusCode::NOT_FOUND),
            (AuthError::RoleAlreadyExists, StatusCode::CONFLICT),
            (AuthError::UserAlreadyInRole, StatusCode::CONFLICT),
        ];

        for (err, expected) in cases {
            let (status, _) = ApiError::from(err).status();
            assert_eq!(status, expected);
        }
    }

    #[test]
    fn test_storage_failure_hides_details() {
        let err = ApiError::from(AuthError::Storage(StorageError::Backend(
            "connection reset".to_string(),
        )));
        assert_eq!(err.status(), (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"));

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

//! Login, sign-up and self-service account routes

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use super::error::{ApiError, ApiResult};
use crate::error::AuthError;
use crate::models::User;
use crate::repositories::Storage;
use crate::state::AppState;
use crate::stores::Caller;

/// Request for user login; `username` also accepts an email address
#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Response for user login
#[derive(Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub user: User,
}

/// Request for self-service sign-up
#[derive(Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    pub password: Option<String>,
}

/// Request for changing one's own password
#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "auth-service"
    }))
}

/// User login endpoint
pub async fn login<S: Storage>(
    State(state): State<AppState<S>>,
    WithRejection(Json(payload), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    if payload.username.is_empty() || payload.password.is_empty() {
        return Err(ApiError::BadRequest(
            "username and password are required".to_string(),
        ));
    }

    info!("Login attempt for user: {}", payload.username);
    let user = state
        .accounts
        .authenticate(&payload.username, &payload.password)
        .await?;

    let access_token = state.jwt_service.generate_access_token(&user).map_err(|e| {
        error!("Failed to generate access token: {}", e);
        ApiError::InternalServerError
    })?;

    let response = LoginResponse {
        message: "success".to_string(),
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt_service.access_token_expiry(),
        user,
    };

    Ok((StatusCode::OK, Json(response)))
}

/// Self-service sign-up endpoint
pub async fn register<S: Storage>(
    State(state): State<AppState<S>>,
    WithRejection(Json(payload), _): WithRejection<Json<RegisterRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let registration = state
        .accounts
        .register(
            &payload.username,
            &payload.email,
            payload.password.as_deref(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(registration)))
}

/// Logout endpoint
///
/// Tokens are stateless; the client discards its copy.
pub async fn logout(Extension(caller): Extension<Caller>) -> impl IntoResponse {
    info!(user_id = caller.user_id, "Logout");
    Json(json!({"message": "success"}))
}

/// Current user with the roles they hold
pub async fn me<S: Storage>(
    State(state): State<AppState<S>>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<impl IntoResponse> {
    let user = resolve(&state, caller).await?;
    let roles = state.memberships.roles_of(&user).await?;

    Ok(Json(json!({
        "user": user,
        "roles": roles,
    })))
}

pub async fn change_password<S: Storage>(
    State(state): State<AppState<S>>,
    Extension(caller): Extension<Caller>,
    WithRejection(Json(payload), _): WithRejection<Json<ChangePasswordRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    if payload.old_password.is_empty()
        || payload.password.is_empty()
        || payload.confirm_password.is_empty()
    {
        return Err(ApiError::BadRequest(
            "all password fields are required".to_string(),
        ));
    }

    let user = resolve(&state, caller).await?;
    state
        .accounts
        .change_password(
            &user,
            &payload.old_password,
            &payload.password,
            &payload.confirm_password,
        )
        .await?;

    Ok(Json(json!({"message": "success"})))
}

/// A valid token whose user has since been deleted is no longer a session
async fn resolve<S: Storage>(state: &AppState<S>, caller: Caller) -> ApiResult<User> {
    state
        .accounts
        .by_id(caller.user_id)
        .await
        .map_err(|err| match err {
            AuthError::UserNotFound => ApiError::Unauthorized,
            other => ApiError::Auth(other),
        })
}

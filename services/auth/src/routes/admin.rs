//! Administrative CRUD over users, roles and memberships
//!
//! Every route here sits behind the auth middleware and the admin guard.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use serde_json::json;

use super::error::{ApiError, ApiResult};
use crate::models::RoleChanges;
use crate::repositories::Storage;
use crate::state::AppState;
use crate::stores::{DEFAULT_LIST_LIMIT, NameMatch};

/// How many users and roles the dashboard shows
const DASHBOARD_LIMIT: i64 = 10;

#[derive(Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

#[derive(Deserialize)]
pub struct CreateRoleRequest {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
}

/// `?name=` filter of the role listing; `exact=true` disables substring matching
#[derive(Deserialize)]
pub struct RoleQuery {
    pub name: Option<String>,
    #[serde(default)]
    pub exact: bool,
}

/// Latest users and roles
pub async fn dashboard<S: Storage>(
    State(state): State<AppState<S>>,
) -> ApiResult<impl IntoResponse> {
    let users = state.accounts.list(DASHBOARD_LIMIT).await?;
    let roles = state.roles.list(DASHBOARD_LIMIT).await?;

    Ok(Json(json!({
        "latest_10_users": users,
        "latest_10_roles": roles,
    })))
}

pub async fn list_users<S: Storage>(
    State(state): State<AppState<S>>,
) -> ApiResult<impl IntoResponse> {
    let total = state.accounts.count().await?;
    let users = state.accounts.list(DEFAULT_LIST_LIMIT).await?;

    Ok(Json(json!({
        "total": total,
        "users": users,
    })))
}

pub async fn create_user<S: Storage>(
    State(state): State<AppState<S>>,
    WithRejection(Json(payload), _): WithRejection<Json<CreateUserRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let user = state
        .accounts
        .create(
            &payload.username,
            &payload.email,
            &payload.password,
            &payload.confirm_password,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(json!({"user": user}))))
}

pub async fn get_user<S: Storage>(
    State(state): State<AppState<S>>,
    Path(user_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let user = state.accounts.by_id(user_id).await?;
    Ok(Json(json!({"user": user})))
}

pub async fn delete_user<S: Storage>(
    State(state): State<AppState<S>>,
    Path(user_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let user = state.accounts.by_id(user_id).await?;
    state.accounts.delete(&user).await?;
    Ok(Json(json!({"message": "success"})))
}

pub async fn toggle_user<S: Storage>(
    State(state): State<AppState<S>>,
    Path(user_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let user = state.accounts.by_id(user_id).await?;
    let user = state.accounts.toggle_active(&user).await?;
    Ok(Json(json!({"user": user})))
}

pub async fn user_roles<S: Storage>(
    State(state): State<AppState<S>>,
    Path(user_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let user = state.accounts.by_id(user_id).await?;
    let roles = state.memberships.roles_of(&user).await?;
    Ok(Json(json!({"roles": roles})))
}

pub async fn clear_user_roles<S: Storage>(
    State(state): State<AppState<S>>,
    Path(user_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let user = state.accounts.by_id(user_id).await?;
    let cleared = state.memberships.clear_user(&user).await?;
    Ok(Json(json!({"cleared": cleared})))
}

pub async fn grant_role<S: Storage>(
    State(state): State<AppState<S>>,
    Path((user_id, role_id)): Path<(i64, i64)>,
) -> ApiResult<impl IntoResponse> {
    let user = state.accounts.by_id(user_id).await?;
    let role = state.roles.by_id(role_id).await?;
    let membership = state.memberships.grant(&user, &role).await?;
    Ok((StatusCode::CREATED, Json(json!({"membership": membership}))))
}

pub async fn revoke_role<S: Storage>(
    State(state): State<AppState<S>>,
    Path((user_id, role_id)): Path<(i64, i64)>,
) -> ApiResult<impl IntoResponse> {
    let user = state.accounts.by_id(user_id).await?;
    let role = state.roles.by_id(role_id).await?;
    state.memberships.revoke(&user, &role).await?;
    Ok(Json(json!({"message": "success"})))
}

pub async fn list_roles<S: Storage>(
    State(state): State<AppState<S>>,
    WithRejection(Query(query), _): WithRejection<Query<RoleQuery>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let roles = match query.name.as_deref() {
        Some(name) if !name.is_empty() => {
            let mode = if query.exact {
                NameMatch::Exact
            } else {
                NameMatch::Contains
            };
            state.roles.search(name, mode).await?
        }
        _ => state.roles.list(DEFAULT_LIST_LIMIT).await?,
    };

    Ok(Json(json!({"roles": roles})))
}

pub async fn create_role<S: Storage>(
    State(state): State<AppState<S>>,
    WithRejection(Json(payload), _): WithRejection<Json<CreateRoleRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let role = state
        .roles
        .create(&payload.name, payload.description.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(json!({"role": role}))))
}

pub async fn get_role<S: Storage>(
    State(state): State<AppState<S>>,
    Path(role_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let role = state.roles.by_id(role_id).await?;
    Ok(Json(json!({"role": role})))
}

pub async fn edit_role<S: Storage>(
    State(state): State<AppState<S>>,
    Path(role_id): Path<i64>,
    WithRejection(Json(changes), _): WithRejection<Json<RoleChanges>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let role = state.roles.by_id(role_id).await?;
    let role = state.roles.edit(&role, changes).await?;
    Ok(Json(json!({"role": role})))
}

pub async fn delete_role<S: Storage>(
    State(state): State<AppState<S>>,
    Path(role_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let role = state.roles.by_id(role_id).await?;
    state.roles.delete(&role).await?;
    Ok(Json(json!({"message": "success"})))
}

pub async fn toggle_role<S: Storage>(
    State(state): State<AppState<S>>,
    Path(role_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let role = state.roles.by_id(role_id).await?;
    let role = state.roles.toggle_active(&role).await?;
    Ok(Json(json!({"role": role})))
}

pub async fn role_users<S: Storage>(
    State(state): State<AppState<S>>,
    Path(role_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let role = state.roles.by_id(role_id).await?;
    let users = state.memberships.users_of(&role).await?;
    Ok(Json(json!({"users": users})))
}

pub async fn clear_role_users<S: Storage>(
    State(state): State<AppState<S>>,
    Path(role_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let role = state.roles.by_id(role_id).await?;
    let cleared = state.memberships.clear_role(&role).await?;
    Ok(Json(json!({"cleared": cleared})))
}

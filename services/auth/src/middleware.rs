//! Middleware for JWT token validation and the admin guard

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use tracing::{info, warn};

use crate::repositories::Storage;
use crate::routes::ApiError;
use crate::state::AppState;
use crate::stores::Caller;

/// Validate the bearer token and attach the [`Caller`] to the request
pub async fn auth_middleware<S: Storage>(
    State(state): State<AppState<S>>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) = bearer.ok_or(ApiError::Unauthorized)?;

    let claims = state
        .jwt_service
        .validate_token(bearer.token())
        .map_err(|e| {
            warn!("Failed to validate token: {}", e);
            ApiError::Unauthorized
        })?;

    req.extensions_mut().insert(Caller {
        user_id: claims.sub,
    });

    Ok(next.run(req).await)
}

/// Let the request through only when the caller holds one of the admin roles
///
/// Must run after [`auth_middleware`].
pub async fn require_admin<S: Storage>(
    State(state): State<AppState<S>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let caller = req
        .extensions()
        .get::<Caller>()
        .copied()
        .ok_or(ApiError::Unauthorized)?;

    if !state.authorizer.allowed(caller, &*state.admin_roles).await? {
        info!(user_id = caller.user_id, path = %req.uri().path(), "Admin access denied");
        return Err(ApiError::Forbidden);
    }

    Ok(next.run(req).await)
}

//! Authentication service routes

pub mod account;
pub mod admin;
pub mod error;

use axum::{
    Router, middleware,
    routing::{get, post},
};

pub use error::{ApiError, ApiResult};

use crate::middleware::{auth_middleware, require_admin};
use crate::repositories::Storage;
use crate::state::AppState;

/// Create the router for the authentication service
pub fn create_router<S: Storage>(state: AppState<S>) -> Router {
    let public_routes = Router::new()
        .route("/health", get(account::health_check))
        .route("/login", post(account::login::<S>))
        .route("/register", post(account::register::<S>));

    let session_routes = Router::new()
        .route("/logout", post(account::logout))
        .route("/me", get(account::me::<S>))
        .route("/change_password", post(account::change_password::<S>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware::<S>,
        ));

    let admin_routes = Router::new()
        .route("/admin", get(admin::dashboard::<S>))
        .route(
            "/admin/users",
            get(admin::list_users::<S>).post(admin::create_user::<S>),
        )
        .route(
            "/admin/users/:id",
            get(admin::get_user::<S>).delete(admin::delete_user::<S>),
        )
        .route("/admin/users/:id/toggle", post(admin::toggle_user::<S>))
        .route(
            "/admin/users/:id/roles",
            get(admin::user_roles::<S>).delete(admin::clear_user_roles::<S>),
        )
        .route(
            "/admin/users/:id/roles/:role_id",
            post(admin::grant_role::<S>).delete(admin::revoke_role::<S>),
        )
        .route(
            "/admin/roles",
            get(admin::list_roles::<S>).post(admin::create_role::<S>),
        )
        .route(
            "/admin/roles/:id",
            get(admin::get_role::<S>)
                .patch(admin::edit_role::<S>)
                .delete(admin::delete_role::<S>),
        )
        .route("/admin/roles/:id/toggle", post(admin::toggle_role::<S>))
        .route(
            "/admin/roles/:id/users",
            get(admin::role_users::<S>).delete(admin::clear_role_users::<S>),
        )
        // Layers run outermost-last: authentication first, then the role guard
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_admin::<S>,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware::<S>,
        ));

    Router::new()
        .merge(public_routes)
        .merge(session_routes)
        .merge(admin_routes)
        .with_state(state)
}

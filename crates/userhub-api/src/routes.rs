//! API route definitions

use crate::auth::middleware::{auth_middleware, require_roles};
use crate::handlers::{auth, users};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use userhub_core::Role;

/// Routes mounted under the configured API prefix
pub fn api_routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let tokens = state.tokens.clone();

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/auth/refresh-tokens", post(auth::refresh_handler));

    // Any authenticated caller
    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me_handler))
        .route_layer(middleware::from_fn_with_state(tokens.clone(), auth_middleware));

    // Administrators only; the role gate runs after authentication
    let admin_routes = Router::new()
        .route("/users", post(users::create_user).get(users::list_users))
        .route(
            "/users/:id",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route_layer(middleware::from_fn(require_roles(&[Role::Admin])))
        .route_layer(middleware::from_fn_with_state(tokens, auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
}

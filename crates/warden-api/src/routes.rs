//! API route definitions
//!
//! Author: hephaex@gmail.com

use crate::auth::require_access_token;
use crate::handlers::auth;
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Create the `/api/v1/auth` routes
pub fn auth_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Refresh and logout read their own bearer token; only /verify goes
    // through the access-token middleware.
    let public_routes = Router::new()
        .route("/register", post(auth::register_handler))
        .route("/login", post(auth::login_handler))
        .route("/refresh", post(auth::refresh_handler))
        .route("/logout", post(auth::logout_handler));

    let protected_routes = Router::new()
        .route("/verify", get(auth::verify_handler))
        .route_layer(middleware::from_fn_with_state(state, require_access_token));

    Router::new().merge(public_routes).merge(protected_routes)
}

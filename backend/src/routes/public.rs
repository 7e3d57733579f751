use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that need no token. Login is the only way to obtain one.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for load balancers; touches neither the database nor auth.
        .route("/health", get(|| async { "ok" }))
        // POST /register
        // Creates an account with no roles. Roles are granted afterwards through
        // POST /users/{id}/roles by someone holding `update_user`.
        .route("/register", post(handlers::register_user))
        // POST /login
        // Returns a signed token carrying the user's permissions at this moment.
        .route("/login", post(handlers::login))
}

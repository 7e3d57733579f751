use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Every handler here starts with an `Authorized<P>` argument, which rejects the request
/// with 401/403 before the handler body runs. The `{id}` segment never picks the acting
/// user: writes act as the token identity, reads use it as a filter.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Users ---
        // GET /users/{id}                       read_user
        .route("/users/{id}", get(handlers::get_user))
        // POST /users/{id}/roles                update_user
        .route("/users/{id}/roles", post(handlers::assign_roles))
        // --- Blogs ---
        // GET  /users/{id}/blogs                read_blog
        // POST /users/{id}/blogs                create_blog
        .route(
            "/users/{id}/blogs",
            get(handlers::search_blogs).post(handlers::create_blog),
        )
        // GET    /users/{id}/blogs/{blog_id}    read_blog
        // PUT    /users/{id}/blogs/{blog_id}    update_blog
        // DELETE /users/{id}/blogs/{blog_id}    delete_blog
        .route(
            "/users/{id}/blogs/{blog_id}",
            get(handlers::get_blog)
                .put(handlers::update_blog)
                .delete(handlers::delete_blog),
        )
}

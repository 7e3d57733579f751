use crate::{
    AppState,
    auth::{
        Authorized,
        permissions::{CreateBlog, DeleteBlog, ReadBlog, ReadUser, UpdateBlog, UpdateUser},
    },
    error::ApiError,
    models::{
        AssignRolesRequest, Blog, BlogSearch, CreateBlogRequest, ErrorBody, LoginRequest,
        LoginResponse, NewUser, RegisterUserRequest, UpdateBlogRequest, User, UserId,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

// --- Filter Structs ---

/// BlogQuery
///
/// Query parameters for the blog listing endpoint (GET /users/{id}/blogs).
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BlogQuery {
    /// Rows to skip. Defaults to 0.
    pub offset: Option<i64>,
    /// Page size. Defaults to 20, capped at 100.
    pub limit: Option<i64>,
    /// Case-insensitive substring matched against title, content and tags.
    pub search: Option<String>,
}

impl BlogQuery {
    /// Applies defaults and bounds. Negative offsets and non-positive limits are rejected
    /// rather than silently corrected; oversized limits are capped.
    pub fn into_search(self, author: UserId) -> Result<BlogSearch, ApiError> {
        let offset = self.offset.unwrap_or(0);
        if offset < 0 {
            return Err(ApiError::BadRequest("offset must not be negative".into()));
        }
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        if limit <= 0 {
            return Err(ApiError::BadRequest("limit must be positive".into()));
        }
        let text = self
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(BlogSearch {
            author: Some(author),
            text,
            offset,
            limit: limit.min(MAX_PAGE_SIZE),
        })
    }
}

/// Path user ids never select the actor; a mismatch is only logged.
fn note_path_mismatch(operation: &'static str, path_id: UserId, actor: UserId) {
    if path_id != actor {
        tracing::warn!(
            operation,
            %path_id,
            %actor,
            "path user id differs from token identity; acting as token identity"
        );
    }
}

// --- Public Handlers ---

/// register_user
///
/// [Public Route] Creates an account with no roles. The password is hashed on the
/// blocking pool before the insert; a taken username surfaces as 409.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "Registered", body = User),
        (status = 400, description = "Missing fields", body = ErrorBody),
        (status = 409, description = "Username taken", body = ErrorBody)
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    // Step 1: Validate the payload.
    let missing = payload.missing_fields();
    if !missing.is_empty() {
        return Err(ApiError::BadRequest(format!(
            "missing required fields: {}",
            missing.join(", ")
        )));
    }

    // Step 2: Hash off the async executor.
    let verifier = state.credentials.clone();
    let password = payload.password;
    let password_hash = tokio::task::spawn_blocking(move || verifier.hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("hashing task failed: {e}")))?
        .map_err(|e| ApiError::Internal(format!("hashing failed: {e}")))?;

    // Step 3: Persist.
    let user = state
        .users
        .create_user(NewUser {
            username: payload.username,
            password_hash,
            first_name: payload.first_name,
            last_name: payload.last_name,
        })
        .await?;

    tracing::info!(user_id = %user.id, username = %user.username, "user registered");
    Ok((StatusCode::CREATED, Json(user)))
}

/// login
///
/// [Public Route] Exchanges credentials for a bearer token. Every credential failure
/// produces the same 401 body.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let token = state
        .login
        .login(&payload.username, &payload.password)
        .await?;
    Ok(Json(LoginResponse { token }))
}

// --- User Handlers ---

/// get_user
///
/// [Protected: read_user] Returns a user's public profile.
#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = User),
        (status = 404, description = "Not Found", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn get_user(
    _auth: Authorized<ReadUser>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    state
        .users
        .get_user(UserId(id))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("user {id}")))
}

/// assign_roles
///
/// [Protected: update_user] Grants roles by name to the user in the path. The change
/// shows up in that user's token from their next login.
#[utoipa::path(
    post,
    path = "/users/{id}/roles",
    params(("id" = i64, Path, description = "User id")),
    request_body = AssignRolesRequest,
    responses(
        (status = 204, description = "Roles assigned"),
        (status = 400, description = "No roles given", body = ErrorBody),
        (status = 404, description = "Unknown user or role", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn assign_roles(
    Authorized { user_id: actor, .. }: Authorized<UpdateUser>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<AssignRolesRequest>,
) -> Result<StatusCode, ApiError> {
    if payload.roles.is_empty() {
        return Err(ApiError::BadRequest("roles must not be empty".into()));
    }

    let target = UserId(id);
    if state.users.get_user(target).await?.is_none() {
        return Err(ApiError::NotFound(format!("user {id}")));
    }

    state.users.assign_roles(target, &payload.roles).await?;
    tracing::info!(%actor, %target, roles = ?payload.roles, "roles assigned");
    Ok(StatusCode::NO_CONTENT)
}

// --- Blog Handlers ---

/// create_blog
///
/// [Protected: create_blog] The author is always the token identity; the `{id}` path
/// segment is ignored apart from a warning when it disagrees.
#[utoipa::path(
    post,
    path = "/users/{id}/blogs",
    params(("id" = i64, Path, description = "User id (informational)")),
    request_body = CreateBlogRequest,
    responses(
        (status = 201, description = "Created", body = Blog),
        (status = 400, description = "Missing title or content", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn create_blog(
    Authorized { user_id, .. }: Authorized<CreateBlog>,
    State(state): State<AppState>,
    Path(path_id): Path<i64>,
    Json(payload): Json<CreateBlogRequest>,
) -> Result<(StatusCode, Json<Blog>), ApiError> {
    note_path_mismatch("create_blog", UserId(path_id), user_id);

    if payload.title.trim().is_empty() || payload.content.trim().is_empty() {
        return Err(ApiError::BadRequest("title and content are required".into()));
    }

    let blog = state.blogs.create_blog(user_id, payload).await?;
    tracing::info!(blog_id = blog.id, author = %user_id, "blog created");
    Ok((StatusCode::CREATED, Json(blog)))
}

/// search_blogs
///
/// [Protected: read_blog] Lists blogs written by the user in the path, newest first.
#[utoipa::path(
    get,
    path = "/users/{id}/blogs",
    params(("id" = i64, Path, description = "Author id"), BlogQuery),
    responses((status = 200, description = "Blogs", body = [Blog])),
    security(("bearer" = []))
)]
pub async fn search_blogs(
    _auth: Authorized<ReadBlog>,
    State(state): State<AppState>,
    Path(author): Path<i64>,
    Query(query): Query<BlogQuery>,
) -> Result<Json<Vec<Blog>>, ApiError> {
    let search = query.into_search(UserId(author))?;
    let blogs = state.blogs.search_blogs(&search).await?;
    Ok(Json(blogs))
}

/// get_blog
///
/// [Protected: read_blog] A blog that exists but was written by someone other than the
/// path user is reported as 404.
#[utoipa::path(
    get,
    path = "/users/{id}/blogs/{blog_id}",
    params(
        ("id" = i64, Path, description = "Author id"),
        ("blog_id" = i64, Path, description = "Blog id")
    ),
    responses(
        (status = 200, description = "Blog", body = Blog),
        (status = 404, description = "Not Found", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn get_blog(
    _auth: Authorized<ReadBlog>,
    State(state): State<AppState>,
    Path((author, blog_id)): Path<(i64, i64)>,
) -> Result<Json<Blog>, ApiError> {
    state
        .blogs
        .get_blog(blog_id)
        .await?
        .filter(|blog| blog.user_id == UserId(author))
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("blog {blog_id}")))
}

/// update_blog
///
/// [Protected: update_blog] Author-only partial update. Someone else's blog looks the
/// same as a missing one (404).
#[utoipa::path(
    put,
    path = "/users/{id}/blogs/{blog_id}",
    params(
        ("id" = i64, Path, description = "User id (informational)"),
        ("blog_id" = i64, Path, description = "Blog id")
    ),
    request_body = UpdateBlogRequest,
    responses(
        (status = 200, description = "Updated", body = Blog),
        (status = 404, description = "Not Found or Not Author", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn update_blog(
    Authorized { user_id, .. }: Authorized<UpdateBlog>,
    State(state): State<AppState>,
    Path((path_id, blog_id)): Path<(i64, i64)>,
    Json(payload): Json<UpdateBlogRequest>,
) -> Result<Json<Blog>, ApiError> {
    note_path_mismatch("update_blog", UserId(path_id), user_id);

    state
        .blogs
        .update_blog(blog_id, user_id, payload)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("blog {blog_id}")))
}

/// delete_blog
///
/// [Protected: delete_blog] Author-only delete.
#[utoipa::path(
    delete,
    path = "/users/{id}/blogs/{blog_id}",
    params(
        ("id" = i64, Path, description = "User id (informational)"),
        ("blog_id" = i64, Path, description = "Blog id")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found or Not Author", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn delete_blog(
    Authorized { user_id, .. }: Authorized<DeleteBlog>,
    State(state): State<AppState>,
    Path((path_id, blog_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    note_path_mismatch("delete_blog", UserId(path_id), user_id);

    if state.blogs.delete_blog(blog_id, user_id).await? {
        tracing::info!(blog_id, author = %user_id, "blog deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("blog {blog_id}")))
    }
}

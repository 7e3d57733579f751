use std::sync::Arc;

use axum::{Router, extract::FromRef, http::HeaderName};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;

pub mod routes;
use routes::{authenticated, public};

use auth::{
    AuthSetupError, AuthorizationGate, Clock, CredentialVerifier, LoginService, SystemClock,
    TokenIssuer, TokenValidator,
};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use repository::{BlogStoreState, PostgresRepository, UserStoreState};

/// ApiDoc
///
/// OpenAPI document for every handler and schema, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register_user, handlers::login, handlers::get_user, handlers::assign_roles,
        handlers::create_blog, handlers::search_blogs, handlers::get_blog,
        handlers::update_blog, handlers::delete_blog
    ),
    components(
        schemas(
            models::User, models::Blog, models::RegisterUserRequest, models::LoginRequest,
            models::LoginResponse, models::AssignRolesRequest, models::CreateBlogRequest,
            models::UpdateBlogRequest, models::ErrorBody,
        )
    ),
    modifiers(&BearerSecurity),
    tags(
        (name = "quillpost", description = "Blogging API with role-based access control")
    )
)]
struct ApiDoc;

struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "bearer".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// AppState
///
/// Everything a request may need, shared across requests. The auth components are built
/// once from the configuration; none of them holds mutable state.
#[derive(Clone)]
pub struct AppState {
    pub users: UserStoreState,
    pub blogs: BlogStoreState,
    /// Validates bearer tokens for `Authorized<P>` extractors.
    pub gate: Arc<AuthorizationGate>,
    pub login: Arc<LoginService>,
    /// Hashes new passwords (registration, bootstrap).
    pub credentials: Arc<CredentialVerifier>,
    pub config: AppConfig,
}

impl AppState {
    /// new
    ///
    /// Wires the auth components to the wall clock.
    pub fn new(
        config: AppConfig,
        users: UserStoreState,
        blogs: BlogStoreState,
    ) -> Result<Self, AuthSetupError> {
        Self::with_clock(config, users, blogs, Arc::new(SystemClock))
    }

    /// with_clock
    ///
    /// Same as `new` with an explicit time source for issuing and validating tokens.
    ///
    /// # Errors
    /// Empty signing secret, non-positive token TTL or unusable hashing parameters.
    pub fn with_clock(
        config: AppConfig,
        users: UserStoreState,
        blogs: BlogStoreState,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AuthSetupError> {
        if config.token_ttl_minutes <= 0 {
            return Err(AuthSetupError::NonPositiveTtl(config.token_ttl_minutes));
        }

        let credentials = Arc::new(CredentialVerifier::new(config.password_hashing)?);
        let issuer = TokenIssuer::new(&config.jwt_secret, clock.clone())?;
        let validator = TokenValidator::new(&config.jwt_secret, clock)?;

        let login = LoginService::new(
            users.clone(),
            credentials.clone(),
            issuer,
            config.token_ttl_minutes,
        );

        Ok(Self {
            users,
            blogs,
            gate: Arc::new(AuthorizationGate::new(validator)),
            login: Arc::new(login),
            credentials,
            config,
        })
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for UserStoreState {
    fn from_ref(app_state: &AppState) -> UserStoreState {
        app_state.users.clone()
    }
}

impl FromRef<AppState> for BlogStoreState {
    fn from_ref(app_state: &AppState) -> BlogStoreState {
        app_state.blogs.clone()
    }
}

impl FromRef<AppState> for Arc<AuthorizationGate> {
    fn from_ref(app_state: &AppState) -> Arc<AuthorizationGate> {
        app_state.gate.clone()
    }
}

impl FromRef<AppState> for Arc<LoginService> {
    fn from_ref(app_state: &AppState) -> Arc<LoginService> {
        app_state.login.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles public and protected routes, the Swagger UI and the observability layers.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes())
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. One UUID per request, unless the client sent one.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Span per request carrying the request id.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Echo the id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`. Only method, path and request id are recorded; headers
/// are left out so bearer tokens never reach the logs.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = %request.uri().path(),
        req_id = %request_id,
    )
}

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// AuthError
///
/// Every way a login or a protected request can be turned away. The variants carry the
/// precise reason so it can be logged, but the HTTP response built from them only ever
/// says "unauthorized", "forbidden" or "internal server error". A caller must not be able
/// to tell an expired token from a forged one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Unknown username or wrong password. Deliberately indistinguishable.
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("missing or malformed authorization header")]
    MissingOrMalformedHeader,
    #[error("malformed token")]
    MalformedToken,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("token not yet valid")]
    NotYetValid,
    #[error("token expired")]
    Expired,
    #[error("invalid token claims")]
    InvalidClaims,
    #[error("permission denied")]
    PermissionDenied,
    /// The user store could not answer. Not an authorization decision.
    #[error("upstream lookup failure: {0}")]
    UpstreamLookupFailure(String),
    /// Token signing or password hashing failed after startup validation passed.
    #[error("internal auth failure: {0}")]
    Internal(String),
}

impl AuthError {
    /// The outward status. Token and header problems collapse into 401, missing
    /// permissions into 403.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials
            | AuthError::MissingOrMalformedHeader
            | AuthError::MalformedToken
            | AuthError::InvalidSignature
            | AuthError::NotYetValid
            | AuthError::Expired
            | AuthError::InvalidClaims => StatusCode::UNAUTHORIZED,
            AuthError::PermissionDenied => StatusCode::FORBIDDEN,
            AuthError::UpstreamLookupFailure(_) | AuthError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The only text a client ever sees.
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "invalid username or password",
            AuthError::PermissionDenied => "forbidden",
            AuthError::UpstreamLookupFailure(_) | AuthError::Internal(_) => "internal server error",
            _ => "unauthorized",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(json!({ "error": self.public_message() })),
        )
            .into_response()
    }
}

/// AuthSetupError
///
/// Misconfiguration detected while the auth components are being built at startup.
/// None of these can occur on a request path.
#[derive(Debug, Error)]
pub enum AuthSetupError {
    #[error("token signing secret must not be empty")]
    EmptySecret,
    #[error("token ttl must be positive, got {0} minutes")]
    NonPositiveTtl(i64),
    #[error("password hashing setup failed: {0}")]
    Hashing(String),
}

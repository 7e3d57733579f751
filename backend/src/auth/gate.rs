use std::{marker::PhantomData, sync::Arc};

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};

use super::{error::AuthError, permissions::RequiredPermission, token::TokenValidator};
use crate::models::UserId;

/// AuthorizationGate
///
/// The decision point in front of every protected operation. Given the request headers
/// and the permission an operation needs, it either returns the identity embedded in a
/// verified token or a rejection reason. It performs no I/O: the only inputs besides the
/// headers are the signing secret and the clock held by the validator.
///
/// The identity returned here is the *only* identity a protected handler may act as.
/// Path or query parameters naming a user are filters at most, never the actor.
#[derive(Debug)]
pub struct AuthorizationGate {
    validator: TokenValidator,
}

impl AuthorizationGate {
    pub fn new(validator: TokenValidator) -> Self {
        Self { validator }
    }

    /// authorize
    ///
    /// Header → token → validated claims → permission membership. The specific reason
    /// for a rejection is logged here and nowhere else; callers only see the
    /// 401/403 mapping of `AuthError`.
    pub fn authorize(&self, required_permission: &str, headers: &HeaderMap) -> Result<UserId, AuthError> {
        let decision = self.decide(required_permission, headers);
        if let Err(reason) = &decision {
            tracing::warn!(
                required_permission,
                %reason,
                "authorization rejected"
            );
        }
        decision
    }

    fn decide(&self, required_permission: &str, headers: &HeaderMap) -> Result<UserId, AuthError> {
        let token = bearer_token(headers)?;
        let claims = self.validator.validate(token)?;
        if !claims.permissions.contains(required_permission) {
            return Err(AuthError::PermissionDenied);
        }
        tracing::debug!(user_id = %claims.user_id, required_permission, "authorized");
        Ok(claims.user_id)
    }
}

/// bearer_token
///
/// Accepts exactly `<scheme> <token>` with a single space, where the scheme is `Bearer`
/// in any letter case and the token is non-empty.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(AuthError::MissingOrMalformedHeader)?;

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None)
            if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() =>
        {
            Ok(token)
        }
        _ => Err(AuthError::MissingOrMalformedHeader),
    }
}

/// Authorized Extractor Result
///
/// Proof that the request carried a valid token granting `P`. Handlers take it as their
/// first argument and use `user_id` as the acting identity:
///
/// ```ignore
/// async fn create_blog(Authorized { user_id, .. }: Authorized<CreateBlog>, ...)
/// ```
///
/// Rejection: `AuthError`, rendered as a bare 401 or 403.
#[derive(Debug)]
pub struct Authorized<P> {
    pub user_id: UserId,
    _permission: PhantomData<P>,
}

impl<P> Authorized<P> {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            _permission: PhantomData,
        }
    }
}

impl<S, P> FromRequestParts<S> for Authorized<P>
where
    S: Send + Sync,
    Arc<AuthorizationGate>: FromRef<S>,
    P: RequiredPermission,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let gate = Arc::<AuthorizationGate>::from_ref(state);
        let user_id = gate.authorize(P::NAME, &parts.headers)?;
        Ok(Self::new(user_id))
    }
}

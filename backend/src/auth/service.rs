use std::sync::Arc;

use super::{error::AuthError, password::CredentialVerifier, token::TokenIssuer};
use crate::repository::UserStoreState;

/// LoginService
///
/// Exchanges a username and password for a signed access token:
/// credential lookup → password verification → permission resolution → issuance.
///
/// Permissions are read fresh from the store on every login and baked into the token.
/// A role change therefore applies from the user's next login, not to tokens already
/// in circulation.
pub struct LoginService {
    users: UserStoreState,
    verifier: Arc<CredentialVerifier>,
    issuer: TokenIssuer,
    ttl_minutes: i64,
}

impl LoginService {
    pub fn new(
        users: UserStoreState,
        verifier: Arc<CredentialVerifier>,
        issuer: TokenIssuer,
        ttl_minutes: i64,
    ) -> Self {
        Self {
            users,
            verifier,
            issuer,
            ttl_minutes,
        }
    }

    /// login
    ///
    /// Unknown usernames and wrong passwords both end in `InvalidCredentials`, and both
    /// pay for one Argon2 verification so response timing does not separate them either.
    /// Store failures surface as `UpstreamLookupFailure` and are not retried.
    pub async fn login(&self, username: &str, password: &str) -> Result<String, AuthError> {
        let credential = self
            .users
            .lookup_credential(username)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "credential lookup failed");
                AuthError::UpstreamLookupFailure(e.to_string())
            })?;

        let verifier = self.verifier.clone();
        let supplied = password.to_owned();
        let verified_id = tokio::task::spawn_blocking(move || match credential {
            Some(credential) => verifier
                .verify(&credential.password_hash, &supplied)
                .then_some(credential.user_id),
            None => {
                verifier.burn_equivalent_work(&supplied);
                None
            }
        })
        .await
        .map_err(|e| AuthError::Internal(format!("password verification task failed: {e}")))?;

        let Some(user_id) = verified_id else {
            tracing::warn!("login rejected: invalid credentials");
            return Err(AuthError::InvalidCredentials);
        };

        let permissions = self.users.permissions_for(user_id).await.map_err(|e| {
            tracing::error!(error = %e, %user_id, "permission lookup failed");
            AuthError::UpstreamLookupFailure(e.to_string())
        })?;

        let token = self.issuer.issue(user_id, &permissions, self.ttl_minutes)?;
        tracing::info!(%user_id, permissions = permissions.len(), "login succeeded");
        Ok(token)
    }
}

impl std::fmt::Debug for LoginService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginService")
            .field("issuer", &self.issuer)
            .field("ttl_minutes", &self.ttl_minutes)
            .finish_non_exhaustive()
    }
}

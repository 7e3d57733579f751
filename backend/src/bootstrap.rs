use std::sync::Arc;

use thiserror::Error;

use crate::{
    auth::CredentialVerifier,
    config::DefaultAdminConfig,
    models::{NewUser, UserId},
    repository::{StoreError, UserStoreState},
};

pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("role `{0}` is not seeded; were the migrations applied?")]
    MissingRole(&'static str),
    #[error("hashing the default admin password failed: {0}")]
    Hashing(String),
}

/// ensure_default_admin
///
/// Makes sure an account named `admin.username` exists and holds the `admin` role.
/// An existing account keeps its password; only the role grant is re-applied.
/// Nothing is written when the `admin` role itself is missing.
/// Returns the admin's identity.
pub async fn ensure_default_admin(
    users: &UserStoreState,
    admin: &DefaultAdminConfig,
    verifier: Arc<CredentialVerifier>,
) -> Result<UserId, BootstrapError> {
    if users.get_role_by_name(ADMIN_ROLE).await?.is_none() {
        return Err(BootstrapError::MissingRole(ADMIN_ROLE));
    }

    let user_id = match users.get_user_by_username(&admin.username).await? {
        Some(existing) => existing.id,
        None => {
            let password = admin.password.clone();
            let password_hash =
                tokio::task::spawn_blocking(move || verifier.hash_password(&password))
                    .await
                    .map_err(|e| BootstrapError::Hashing(e.to_string()))?
                    .map_err(|e| BootstrapError::Hashing(e.to_string()))?;

            let created = users
                .create_user(NewUser {
                    username: admin.username.clone(),
                    password_hash,
                    first_name: "Default".to_string(),
                    last_name: "Admin".to_string(),
                })
                .await?;
            tracing::info!(user_id = %created.id, username = %created.username, "default admin created");
            created.id
        }
    };

    users
        .assign_roles(user_id, &[ADMIN_ROLE.to_string()])
        .await?;
    Ok(user_id)
}

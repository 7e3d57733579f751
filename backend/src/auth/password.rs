//! Password hashing and verification.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use super::error::AuthSetupError;

/// Argon2 hashing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Params {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Argon2Params {
    fn to_argon2(self) -> Result<Argon2<'static>, argon2::Error> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None)?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

impl Default for Argon2Params {
    /// Argon2id RFC 9106 second recommended option.
    fn default() -> Self {
        Self {
            memory_kib: 19456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// CredentialVerifier
///
/// Produces and checks salted Argon2id password hashes. Verification parameters are read
/// from the stored PHC string, so hashes created under older parameters keep working.
///
/// Holds one throwaway hash so that a login for an unknown username still pays the full
/// hashing cost (see `burn_equivalent_work`).
#[derive(Clone)]
pub struct CredentialVerifier {
    params: Argon2Params,
    dummy_hash: String,
}

impl CredentialVerifier {
    pub fn new(params: Argon2Params) -> Result<Self, AuthSetupError> {
        let dummy_hash = hash_with(params, "quillpost-unknown-account")
            .map_err(|e| AuthSetupError::Hashing(e.to_string()))?;
        Ok(Self { params, dummy_hash })
    }

    /// Hash a new password with a fresh random salt.
    pub fn hash_password(&self, password: &str) -> Result<String, argon2::password_hash::Error> {
        hash_with(self.params, password)
    }

    /// verify
    ///
    /// Returns true only if `supplied_password` matches `stored_hash`. A stored hash that
    /// cannot be parsed is a mismatch, not an error. The digest comparison inside the
    /// `password-hash` crate is constant-time.
    pub fn verify(&self, stored_hash: &str, supplied_password: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(stored_hash) else {
            tracing::warn!("stored credential hash is not a valid PHC string");
            return false;
        };
        Argon2::default()
            .verify_password(supplied_password.as_bytes(), &parsed)
            .is_ok()
    }

    /// Runs one verification against the throwaway hash and discards the result.
    pub fn burn_equivalent_work(&self, supplied_password: &str) {
        let _ = self.verify(&self.dummy_hash, supplied_password);
    }
}

impl std::fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVerifier")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

fn hash_with(params: Argon2Params, input: &str) -> Result<String, argon2::password_hash::Error> {
    let argon2 = params.to_argon2()?;
    let salt = SaltString::generate(&mut OsRng);
    Ok(argon2.hash_password(input.as_bytes(), &salt)?.to_string())
}

//! Access token issuance and validation (HS256 JWT).

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use super::{
    claims::{Claims, Clock, TOKEN_ISSUER, numeric_date},
    error::{AuthError, AuthSetupError},
    permissions::PermissionSet,
};
use crate::models::UserId;

/// The only algorithm this service signs with or accepts.
const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;
const SIGNING_ALGORITHM_NAME: &str = "HS256";

/// TokenIssuer
///
/// Signs claims with the server secret. Built once at startup; an empty secret is
/// rejected there so that `issue` never fails for configuration reasons.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    clock: Arc<dyn Clock>,
}

impl TokenIssuer {
    pub fn new(secret: &str, clock: Arc<dyn Clock>) -> Result<Self, AuthSetupError> {
        if secret.is_empty() {
            return Err(AuthSetupError::EmptySecret);
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            clock,
        })
    }

    /// issue
    ///
    /// Builds `iat = nbf = now`, `exp = now + ttl_minutes` and signs the result.
    /// A zero or negative ttl yields a token that is already expired.
    pub fn issue(
        &self,
        user_id: UserId,
        permissions: &PermissionSet,
        ttl_minutes: i64,
    ) -> Result<String, AuthError> {
        let issued_at = self.clock.now().timestamp();
        let claims = Claims {
            user_id,
            permissions: permissions.clone(),
            iat: issued_at,
            nbf: issued_at,
            exp: issued_at.saturating_add(ttl_minutes.saturating_mul(60)),
            iss: TOKEN_ISSUER.to_string(),
        };

        encode(&Header::new(SIGNING_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("token signing failed: {e}")))
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("algorithm", &SIGNING_ALGORITHM)
            .finish_non_exhaustive()
    }
}

/// TokenValidator
///
/// Turns a token string back into trusted `Claims`. The checks run in a fixed order and
/// stop at the first failure:
///
/// 1. structure: three base64url segments, JSON header declaring HS256, JSON object payload
/// 2. signature: HMAC-SHA-256 recomputed and compared in constant time
/// 3. time: `now < nbf` is `NotYetValid`, `now >= exp` is `Expired`
/// 4. shape: the payload must deserialize into `Claims` with our issuer label
pub struct TokenValidator {
    decoding_key: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl TokenValidator {
    pub fn new(secret: &str, clock: Arc<dyn Clock>) -> Result<Self, AuthSetupError> {
        if secret.is_empty() {
            return Err(AuthSetupError::EmptySecret);
        }

        // jsonwebtoken only verifies the signature and algorithm here. Time and claim
        // checks run afterwards against the injected clock.
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.required_spec_claims.clear();

        Ok(Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            clock,
        })
    }

    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        check_structure(token)?;

        let payload = decode::<Map<String, Value>>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                ErrorKind::InvalidToken
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_) => AuthError::MalformedToken,
                _ => AuthError::InvalidSignature,
            })?
            .claims;

        let now = self.clock.now().timestamp();
        let not_before = timestamp_claim(&payload, "nbf")?;
        let expires_at = timestamp_claim(&payload, "exp")?;
        if now < not_before {
            return Err(AuthError::NotYetValid);
        }
        if now >= expires_at {
            return Err(AuthError::Expired);
        }

        let claims: Claims =
            serde_json::from_value(Value::Object(payload)).map_err(|_| AuthError::InvalidClaims)?;
        if claims.iss != TOKEN_ISSUER {
            return Err(AuthError::InvalidClaims);
        }
        Ok(claims)
    }
}

impl std::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidator")
            .field("algorithm", &SIGNING_ALGORITHM)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct JoseHeader {
    alg: String,
}

fn check_structure(token: &str) -> Result<(), AuthError> {
    let mut segments = token.split('.');
    let (Some(header), Some(payload), Some(signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(AuthError::MalformedToken);
    };

    let header: JoseHeader = decode_json_segment(header)?;
    if header.alg != SIGNING_ALGORITHM_NAME {
        return Err(AuthError::MalformedToken);
    }
    let _: Map<String, Value> = decode_json_segment(payload)?;

    if signature.is_empty() || URL_SAFE_NO_PAD.decode(signature).is_err() {
        return Err(AuthError::MalformedToken);
    }
    Ok(())
}

fn decode_json_segment<T: DeserializeOwned>(segment: &str) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthError::MalformedToken)?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::MalformedToken)
}

fn timestamp_claim(payload: &Map<String, Value>, name: &str) -> Result<i64, AuthError> {
    payload
        .get(name)
        .and_then(Value::as_number)
        .and_then(numeric_date)
        .ok_or(AuthError::InvalidClaims)
}

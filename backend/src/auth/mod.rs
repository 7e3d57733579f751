//! Authentication and role-based authorization.
//!
//! Login: `LoginService` looks up the credential, checks it with `CredentialVerifier`,
//! resolves the user's permissions through the `UserStore` and signs them into a token
//! with `TokenIssuer`.
//!
//! Protected requests: the `Authorized<P>` extractor asks the `AuthorizationGate`, which
//! validates the bearer token with `TokenValidator` and checks that `P` is granted.

pub mod claims;
pub mod error;
pub mod gate;
pub mod password;
pub mod permissions;
pub mod service;
pub mod token;

pub use claims::{Claims, Clock, SystemClock, TOKEN_ISSUER};
pub use error::{AuthError, AuthSetupError};
pub use gate::{AuthorizationGate, Authorized, bearer_token};
pub use password::{Argon2Params, CredentialVerifier};
pub use permissions::{PermissionSet, RequiredPermission};
pub use service::LoginService;
pub use token::{TokenIssuer, TokenValidator};

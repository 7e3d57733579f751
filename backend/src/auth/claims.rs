use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, de::Error as _};
use serde_json::Number;

use super::permissions::PermissionSet;
use crate::models::UserId;

/// Issuer label stamped into every token and required on the way back in.
pub const TOKEN_ISSUER: &str = "quillpost";

/// Claims
///
/// The signed payload of an access token. Timestamps are Unix seconds (UTC); fractional
/// values in a received token are floored to whole seconds.
/// A `Claims` value handed out by the validator has passed signature, time and shape
/// checks; anything else holding one built it by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// The authenticated identity. Handlers act on behalf of this id and nothing else.
    pub user_id: UserId,
    /// Effective permissions at login time. Role changes apply from the next login.
    pub permissions: PermissionSet,
    #[serde(deserialize_with = "deserialize_numeric_date")]
    pub iat: i64,
    #[serde(deserialize_with = "deserialize_numeric_date")]
    pub nbf: i64,
    #[serde(deserialize_with = "deserialize_numeric_date")]
    pub exp: i64,
    pub iss: String,
}

/// Whole Unix seconds from a JSON number. Integers pass through; finite floats within
/// the `i64` range are floored. Anything else is `None`.
pub(crate) fn numeric_date(number: &Number) -> Option<i64> {
    if let Some(seconds) = number.as_i64() {
        return Some(seconds);
    }
    let seconds = number.as_f64()?.floor();
    (seconds.is_finite() && seconds >= i64::MIN as f64 && seconds < i64::MAX as f64)
        .then_some(seconds as i64)
}

fn deserialize_numeric_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let number = Number::deserialize(deserializer)?;
    numeric_date(&number).ok_or_else(|| D::Error::custom("timestamp out of range"))
}

/// Clock
///
/// Source of "now" for issuing and validating tokens. Injected so that expiry can be
/// exercised without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identity claims as returned by the provider
pub type Claims = Map<String, Value>;

/// The authenticated identity carried in the session cookie.
///
/// Timestamps are epoch seconds. `expires_at` is the access token expiry,
/// not the session deadline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub user: Claims,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Session {
    /// A fresh session for `user`, created and last touched at `now`
    #[must_use]
    pub fn new(user: Claims, now: i64) -> Self {
        Self {
            user,
            id_token: None,
            access_token: None,
            refresh_token: None,
            token_type: None,
            expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Subject claim, when present
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.user.get("sub").and_then(Value::as_str)
    }
}

/// Remove every claim named in `filter` from `claims`
#[must_use]
pub fn filter_claims(mut claims: Claims, filter: &[String]) -> Claims {
    for name in filter {
        claims.remove(name);
    }
    claims
}

/// Current time in epoch seconds
#[must_use]
pub fn now_epoch() -> i64 {
    chrono::Utc::now().timestamp()
}

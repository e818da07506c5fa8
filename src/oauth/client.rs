//! Interface to the OpenID Connect client collaborator
//!
//! Discovery, the token endpoint, JWKS and signature checks live behind
//! [`OidcClient`]; this crate never talks to the provider itself.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::Claims;
use crate::oauth::params::AuthorizationParams;

/// Tokens returned by the token endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: Option<String>,
    pub id_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
    /// Epoch seconds
    pub expires_at: Option<i64>,
}

/// What the client must verify besides signature, issuer and audience
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdTokenChecks {
    pub nonce: Option<String>,
    pub max_age: Option<u64>,
    /// Seconds of leeway for `exp`, `iat` and `auth_time`
    pub clock_tolerance: u64,
    pub signing_alg: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndSessionParams {
    pub id_token_hint: Option<String>,
    pub post_logout_redirect_uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OidcClientError {
    /// The provider refused the request, e.g. `invalid_grant`
    #[error("{error}: {}", description.as_deref().unwrap_or("no description"))]
    Rejected {
        error: String,
        description: Option<String>,
    },
    #[error("ID token rejected: {0}")]
    IdToken(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("client configuration error: {0}")]
    Configuration(String),
}

impl OidcClientError {
    /// Whether the failure is attributable to the request rather than the
    /// provider or network
    #[must_use]
    pub const fn is_client_attributable(&self) -> bool {
        matches!(self, Self::Rejected { .. } | Self::IdToken(_))
    }
}

#[async_trait]
pub trait OidcClient: Send + Sync {
    /// Build the authorization endpoint URL
    ///
    /// # Errors
    ///
    /// Returns an error if provider metadata is unavailable
    fn authorization_url(&self, params: &AuthorizationParams) -> Result<String, OidcClientError>;

    /// Redeem an authorization code at the token endpoint
    ///
    /// # Errors
    ///
    /// Returns an error if the provider rejects the code or cannot be reached
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
        redirect_uri: &str,
    ) -> Result<TokenSet, OidcClientError>;

    /// Verify an ID token and return its claims
    ///
    /// # Errors
    ///
    /// Returns an error if the signature, issuer, audience, nonce, expiry or
    /// `auth_time` check fails
    async fn validate_id_token(
        &self,
        id_token: &str,
        checks: &IdTokenChecks,
    ) -> Result<Claims, OidcClientError>;

    /// Build the end-session endpoint URL
    ///
    /// # Errors
    ///
    /// Returns an error if the provider has no end-session endpoint
    fn end_session_url(&self, params: &EndSessionParams) -> Result<String, OidcClientError>;

    /// Exchange a refresh token for fresh tokens
    ///
    /// # Errors
    ///
    /// Returns an error if the provider rejects the refresh token or cannot
    /// be reached
    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, OidcClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_attribution() {
        let rejected = OidcClientError::Rejected {
            error: "invalid_grant".to_string(),
            description: Some("code expired".to_string()),
        };
        assert!(rejected.is_client_attributable());
        assert_eq!(rejected.to_string(), "invalid_grant: code expired");
        assert!(OidcClientError::IdToken("nonce mismatch".to_string()).is_client_attributable());
        assert!(!OidcClientError::Transport("reset".to_string()).is_client_attributable());
    }
}

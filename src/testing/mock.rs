//! Mock objects and fake implementations for testing
//!
//! [`MockOidcClient`] stands in for the provider: it builds predictable URLs,
//! returns scripted tokens and claims, and records what it was asked.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use url::Url;

use crate::models::{now_epoch, Claims};
use crate::oauth::{
    AuthorizationParams, EndSessionParams, IdTokenChecks, OidcClient, OidcClientError, TokenSet,
};

use super::constants::{TEST_CLIENT_ID, TEST_EMAIL, TEST_ISSUER, TEST_SUBJECT};

/// Token exchange as seen by the mock: code and PKCE verifier
pub type RecordedExchange = (String, Option<String>);

#[derive(Debug, Default)]
struct MockState {
    claims: Claims,
    tokens: TokenSet,
    refreshed: TokenSet,
    failure: Option<OidcClientError>,
    id_token_failure: Option<OidcClientError>,
    delay: Option<Duration>,
    authorizations: Vec<AuthorizationParams>,
    checks: Vec<IdTokenChecks>,
    exchanges: Vec<RecordedExchange>,
    refreshes: Vec<String>,
}

/// Scriptable OIDC client
#[derive(Debug)]
pub struct MockOidcClient {
    state: Mutex<MockState>,
}

impl Default for MockOidcClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockOidcClient {
    /// A provider that accepts everything and returns the test user
    #[must_use]
    pub fn new() -> Self {
        let now = now_epoch();
        let mut claims = Claims::new();
        claims.insert("sub".to_string(), json!(TEST_SUBJECT));
        claims.insert("email".to_string(), json!(TEST_EMAIL));
        claims.insert("name".to_string(), json!("Test User"));
        claims.insert("iss".to_string(), json!(TEST_ISSUER));
        claims.insert("aud".to_string(), json!(TEST_CLIENT_ID));
        claims.insert("iat".to_string(), json!(now));
        claims.insert("exp".to_string(), json!(now + 3600));

        let tokens = TokenSet {
            access_token: Some("mock-access-token".to_string()),
            id_token: Some("mock-id-token".to_string()),
            refresh_token: Some("mock-refresh-token".to_string()),
            token_type: Some("Bearer".to_string()),
            expires_at: Some(now + 3600),
        };
        let refreshed = TokenSet {
            access_token: Some("mock-refreshed-access-token".to_string()),
            id_token: Some("mock-refreshed-id-token".to_string()),
            refresh_token: None,
            token_type: Some("Bearer".to_string()),
            expires_at: Some(now + 7200),
        };

        Self {
            state: Mutex::new(MockState {
                claims,
                tokens,
                refreshed,
                ..MockState::default()
            }),
        }
    }

    #[must_use]
    pub fn with_claims(self, claims: Claims) -> Self {
        self.lock().claims = claims;
        self
    }

    /// Tokens returned by `exchange_code`
    #[must_use]
    pub fn with_tokens(self, tokens: TokenSet) -> Self {
        self.lock().tokens = tokens;
        self
    }

    /// Tokens returned by `refresh`
    #[must_use]
    pub fn with_refreshed_tokens(self, tokens: TokenSet) -> Self {
        self.lock().refreshed = tokens;
        self
    }

    /// Fail `exchange_code` and `refresh` with `err`
    #[must_use]
    pub fn failing_with(self, err: OidcClientError) -> Self {
        self.lock().failure = Some(err);
        self
    }

    /// Reject every ID token with `err`
    #[must_use]
    pub fn rejecting_id_tokens(self, err: OidcClientError) -> Self {
        self.lock().id_token_failure = Some(err);
        self
    }

    /// Sleep before answering `exchange_code` and `refresh`
    #[must_use]
    pub fn with_delay(self, delay: Duration) -> Self {
        self.lock().delay = Some(delay);
        self
    }

    #[must_use]
    pub fn last_authorization(&self) -> Option<AuthorizationParams> {
        self.lock().authorizations.last().cloned()
    }

    #[must_use]
    pub fn id_token_checks(&self) -> Vec<IdTokenChecks> {
        self.lock().checks.clone()
    }

    #[must_use]
    pub fn exchanges(&self) -> Vec<RecordedExchange> {
        self.lock().exchanges.clone()
    }

    /// Refresh tokens presented so far
    #[must_use]
    pub fn refreshes(&self) -> Vec<String> {
        self.lock().refreshes.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn pause(&self) {
        let delay = self.lock().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl OidcClient for MockOidcClient {
    fn authorization_url(&self, params: &AuthorizationParams) -> Result<String, OidcClientError> {
        self.lock().authorizations.push(params.clone());
        Url::parse_with_params(&format!("{TEST_ISSUER}/authorize"), params.to_pairs())
            .map(String::from)
            .map_err(|e| OidcClientError::Configuration(e.to_string()))
    }

    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
        _redirect_uri: &str,
    ) -> Result<TokenSet, OidcClientError> {
        self.pause().await;
        let mut state = self.lock();
        state
            .exchanges
            .push((code.to_string(), code_verifier.map(ToString::to_string)));
        match &state.failure {
            Some(err) => Err(err.clone()),
            None => Ok(state.tokens.clone()),
        }
    }

    async fn validate_id_token(
        &self,
        _id_token: &str,
        checks: &IdTokenChecks,
    ) -> Result<Claims, OidcClientError> {
        let mut state = self.lock();
        state.checks.push(checks.clone());
        if let Some(err) = &state.id_token_failure {
            return Err(err.clone());
        }
        let mut claims = state.claims.clone();
        if let Some(nonce) = &checks.nonce {
            claims.insert("nonce".to_string(), json!(nonce));
        }
        Ok(claims)
    }

    fn end_session_url(&self, params: &EndSessionParams) -> Result<String, OidcClientError> {
        let mut pairs = vec![(
            "post_logout_redirect_uri",
            params.post_logout_redirect_uri.as_str(),
        )];
        if let Some(hint) = params.id_token_hint.as_deref() {
            pairs.push(("id_token_hint", hint));
        }
        Url::parse_with_params(&format!("{TEST_ISSUER}/session/end"), pairs)
            .map(String::from)
            .map_err(|e| OidcClientError::Configuration(e.to_string()))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, OidcClientError> {
        self.pause().await;
        let mut state = self.lock();
        state.refreshes.push(refresh_token.to_string());
        match &state.failure {
            Some(err) => Err(err.clone()),
            None => Ok(state.refreshed.clone()),
        }
    }
}

//! Test fixtures providing pre-built test objects

use std::sync::Arc;

use actix_web::cookie::Cookie;
use actix_web::http::Method;
use serde_json::json;

use crate::authentication::OidcAuth;
use crate::models::{Claims, Session};
use crate::oauth::OidcClient;
use crate::request::AuthRequest;
use crate::settings::{AuthSettings, RawSettings, SecretSetting};

use super::constants::{
    TEST_BASE_URL, TEST_CLIENT_ID, TEST_CLIENT_SECRET, TEST_EMAIL, TEST_ISSUER, TEST_SECRET,
    TEST_SUBJECT,
};

/// Central fixture provider for all test data
pub struct TestFixtures;

impl TestFixtures {
    /// Minimal raw settings for the implicit `id_token` flow
    #[must_use]
    pub fn raw_settings() -> RawSettings {
        RawSettings {
            secret: Some(SecretSetting::One(TEST_SECRET.to_string())),
            base_url: Some(TEST_BASE_URL.to_string()),
            issuer_base_url: Some(TEST_ISSUER.to_string()),
            client_id: Some(TEST_CLIENT_ID.to_string()),
            client_secret: Some(TEST_CLIENT_SECRET.to_string()),
            ..RawSettings::default()
        }
    }

    /// Validated settings for the `id_token` flow
    ///
    /// # Panics
    ///
    /// Panics if the fixture settings fail validation.
    #[must_use]
    pub fn settings() -> AuthSettings {
        Self::raw_settings()
            .validate()
            .expect("fixture settings are valid")
    }

    /// Validated settings for the `code` flow
    ///
    /// # Panics
    ///
    /// Panics if the fixture settings fail validation.
    #[must_use]
    pub fn code_flow_settings() -> AuthSettings {
        let mut raw = Self::raw_settings();
        raw.authorization_params.response_type = Some("code".to_string());
        raw.validate().expect("fixture settings are valid")
    }

    /// Claims for the test user, as stored after filtering
    #[must_use]
    pub fn user_claims() -> Claims {
        let mut claims = Claims::new();
        claims.insert("sub".to_string(), json!(TEST_SUBJECT));
        claims.insert("email".to_string(), json!(TEST_EMAIL));
        claims.insert("name".to_string(), json!("Test User"));
        claims
    }

    /// An authenticated session created at `now`
    #[must_use]
    pub fn session(now: i64) -> Session {
        let mut session = Session::new(Self::user_claims(), now);
        session.id_token = Some("test-id-token".to_string());
        session.access_token = Some("test-access-token".to_string());
        session.refresh_token = Some("test-refresh-token".to_string());
        session.token_type = Some("Bearer".to_string());
        session.expires_at = Some(now + 3600);
        session
    }

    #[must_use]
    pub fn auth(settings: AuthSettings, client: Arc<dyn OidcClient>) -> OidcAuth {
        OidcAuth::new(settings, client)
    }

    /// A request carrying `cookies`, skipping removal cookies the way a
    /// browser would
    #[must_use]
    pub fn request_with_cookies(
        method: Method,
        path: &str,
        cookies: &[Cookie<'static>],
    ) -> AuthRequest {
        cookies
            .iter()
            .filter(|c| !c.value().is_empty())
            .fold(AuthRequest::new(method, path), |req, c| {
                req.with_cookie(c.name(), c.value())
            })
    }
}

//! Session cookie codec
//!
//! A session is serialized to JSON, sealed with AES-256-GCM under a key
//! derived for the session-cookie purpose, and written as `name` or, when it
//! does not fit in one cookie, as `name.0`, `name.1`, ... chunks.
//!
//! Decoding never reports why a cookie was rejected. Missing, duplicated or
//! truncated chunks, tag failures under every key, malformed payloads and
//! expired sessions all come back as `None` with a debug log line.

use actix_web::cookie::Cookie;
use anyhow::Result;

use crate::models::Session;
use crate::request::AuthRequest;
use crate::session::cookie::{
    build_cookie, chunk_index, chunk_name, value_budget, CookieFactory,
};
use crate::session::validation::{self, Freshness};
use crate::settings::{AuthSettings, ExpiryPolicy};
use crate::utils::crypto::{decrypt_with_keys, derive_keys, encrypt_data, EncryptionKey, KeyPurpose};

/// Widest chunk suffix assumed when sizing chunks
const CHUNK_SUFFIX_RESERVE: &str = ".999";

/// A session read back from the request
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSession {
    pub session: Session,
    /// The cookie should be re-issued: the rolling window moved on, or the
    /// session was sealed with a retired key
    pub renew: bool,
    /// Position in the secret list of the key that opened the cookie
    pub key_index: usize,
}

#[derive(Debug, Clone)]
pub struct SessionCodec {
    name: String,
    keys: Vec<EncryptionKey>,
    policy: ExpiryPolicy,
    cookies: CookieFactory,
}

impl SessionCodec {
    #[must_use]
    pub fn new(settings: &AuthSettings) -> Self {
        Self {
            name: settings.session.name.clone(),
            keys: derive_keys(&settings.secrets, KeyPurpose::SessionCookie),
            policy: settings.session.expiry,
            cookies: CookieFactory::new(&settings.session.cookie),
        }
    }

    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.name
    }

    /// Seal `session` into cookies, stamping `updated_at = now`.
    ///
    /// The returned list also expires whichever stale cookies the request
    /// carries from a previous, differently sized session.
    ///
    /// # Errors
    ///
    /// Returns an error if no key is configured or encryption fails
    pub fn encode(
        &self,
        session: &Session,
        req: &AuthRequest,
        now: i64,
    ) -> Result<Vec<Cookie<'static>>> {
        let mut session = session.clone();
        session.updated_at = now;

        let key = self
            .keys
            .first()
            .ok_or_else(|| anyhow::anyhow!("no session secret configured"))?;
        let value = encrypt_data(&session, key)?;

        let remaining =
            validation::deadline(&self.policy, session.created_at, session.updated_at) - now;
        let options = self.cookies.options(req, self.cookies.lifetime(remaining));

        let mut cookies = Vec::new();
        let existing_chunks = self.chunk_indices(req);

        if value.len() <= value_budget(&self.name, &options) {
            cookies.push(build_cookie(&self.name, value, &options));
            for index in existing_chunks {
                cookies.push(self.cookies.expired(&chunk_name(&self.name, index), req));
            }
            return Ok(cookies);
        }

        let chunk_size = value_budget(&format!("{}{CHUNK_SUFFIX_RESERVE}", self.name), &options);
        if chunk_size == 0 {
            anyhow::bail!("cookie attributes leave no room for a session value");
        }
        let chunks: Vec<&str> = value
            .as_bytes()
            .chunks(chunk_size)
            .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
            .collect();
        log::debug!(
            "Session value of {} bytes split into {} chunks",
            value.len(),
            chunks.len()
        );

        for (index, chunk) in chunks.iter().enumerate() {
            cookies.push(build_cookie(
                &chunk_name(&self.name, index),
                (*chunk).to_string(),
                &options,
            ));
        }
        if req.cookie(&self.name).is_some() {
            cookies.push(self.cookies.expired(&self.name, req));
        }
        for index in existing_chunks.into_iter().filter(|i| *i >= chunks.len()) {
            cookies.push(self.cookies.expired(&chunk_name(&self.name, index), req));
        }

        Ok(cookies)
    }

    /// Read the session from the request, or `None` when there is no usable
    /// session
    #[must_use]
    pub fn decode(&self, req: &AuthRequest, now: i64) -> Option<DecodedSession> {
        let value = self.read_value(req)?;

        let Some((key_index, session)) = decrypt_with_keys::<Session>(&value, &self.keys) else {
            log::debug!("Session cookie rejected: no configured key opened it");
            return None;
        };

        match validation::evaluate(&self.policy, session.created_at, session.updated_at, now) {
            Freshness::Expired => {
                log::debug!("Session cookie rejected: expired");
                None
            }
            Freshness::Valid { renew } => {
                if key_index > 0 {
                    log::debug!("Session opened with retired key #{key_index}");
                }
                Some(DecodedSession {
                    session,
                    renew: renew || key_index > 0,
                    key_index,
                })
            }
        }
    }

    /// Expire the session cookie and every chunk the request carries
    #[must_use]
    pub fn clear(&self, req: &AuthRequest) -> Vec<Cookie<'static>> {
        let mut cookies = vec![self.cookies.expired(&self.name, req)];
        for index in self.chunk_indices(req) {
            cookies.push(self.cookies.expired(&chunk_name(&self.name, index), req));
        }
        cookies
    }

    /// Whether the request carries any session cookie at all
    #[must_use]
    pub fn is_present(&self, req: &AuthRequest) -> bool {
        req.cookie(&self.name).is_some() || !self.chunk_indices(req).is_empty()
    }

    fn chunk_indices(&self, req: &AuthRequest) -> Vec<usize> {
        let mut indices: Vec<usize> = req
            .cookies
            .iter()
            .filter_map(|(name, _)| chunk_index(&self.name, name))
            .collect();
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    /// The sealed value, from the single cookie or the reassembled chunks
    fn read_value(&self, req: &AuthRequest) -> Option<String> {
        let mut singles = req.cookie_values(&self.name);
        if let Some(value) = singles.next() {
            if singles.next().is_some() {
                log::debug!("Session cookie rejected: sent more than once");
                return None;
            }
            return Some(value.to_string());
        }

        let mut chunks: Vec<(usize, &str)> = req
            .cookies
            .iter()
            .filter_map(|(name, value)| {
                chunk_index(&self.name, name).map(|index| (index, value.as_str()))
            })
            .collect();
        if chunks.is_empty() {
            return None;
        }
        chunks.sort_by_key(|(index, _)| *index);

        let mut value = String::new();
        for (expected, (index, chunk)) in chunks.iter().enumerate() {
            if *index != expected {
                log::debug!("Session cookie rejected: chunk {expected} missing or duplicated");
                return None;
            }
            if chunk.is_empty() {
                log::debug!("Session cookie rejected: chunk {index} is empty");
                return None;
            }
            value.push_str(chunk);
        }
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Claims;
    use crate::settings::{RawSettings, SecretSetting};
    use actix_web::cookie::time::Duration;
    use actix_web::http::Method;
    use serde_json::json;

    const NOW: i64 = 1_700_000_000;

    fn settings_with(secrets: &[&str]) -> AuthSettings {
        RawSettings {
            secret: Some(SecretSetting::Many(
                secrets.iter().map(ToString::to_string).collect(),
            )),
            base_url: Some("https://app.example.com".to_string()),
            issuer_base_url: Some("https://op.example.com".to_string()),
            client_id: Some("client-1".to_string()),
            ..RawSettings::default()
        }
        .validate()
        .unwrap()
    }

    fn codec() -> SessionCodec {
        SessionCodec::new(&settings_with(&["current-secret"]))
    }

    fn session(extra_bytes: usize) -> Session {
        let mut user = Claims::new();
        user.insert("sub".to_string(), json!("user-1"));
        user.insert("blob".to_string(), json!("x".repeat(extra_bytes)));
        let mut session = Session::new(user, NOW);
        session.id_token = Some("header.payload.signature".to_string());
        session
    }

    /// The request a browser would send after receiving `cookies`
    fn replay(cookies: &[Cookie<'static>]) -> AuthRequest {
        cookies
            .iter()
            .filter(|c| !c.value().is_empty())
            .fold(AuthRequest::new(Method::GET, "/"), |req, c| {
                req.with_cookie(c.name(), c.value())
            })
    }

    #[test]
    fn test_round_trip_single_cookie() {
        let codec = codec();
        let cookies = codec
            .encode(&session(10), &AuthRequest::new(Method::GET, "/"), NOW)
            .unwrap();
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].name(), "appSession");
        assert_eq!(cookies[0].max_age(), Some(Duration::seconds(86_400)));

        let decoded = codec.decode(&replay(&cookies), NOW + 1).unwrap();
        assert_eq!(decoded.session, session(10));
        assert!(!decoded.renew);
        assert_eq!(decoded.key_index, 0);
    }

    #[test]
    fn test_large_session_is_chunked() {
        let codec = codec();
        let cookies = codec
            .encode(&session(6000), &AuthRequest::new(Method::GET, "/"), NOW)
            .unwrap();

        assert!(cookies.len() >= 2);
        for (index, cookie) in cookies.iter().enumerate() {
            assert_eq!(cookie.name(), format!("appSession.{index}"));
            assert!(cookie.to_string().len() <= 4096);
        }

        let decoded = codec.decode(&replay(&cookies), NOW).unwrap();
        assert_eq!(decoded.session, session(6000));
    }

    #[test]
    fn test_missing_chunk_is_absent() {
        let codec = codec();
        let cookies = codec
            .encode(&session(9000), &AuthRequest::new(Method::GET, "/"), NOW)
            .unwrap();
        assert!(cookies.len() >= 3);

        for skip in 0..cookies.len() {
            let partial: Vec<_> = cookies
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != skip)
                .map(|(_, c)| c.clone())
                .collect();
            assert!(codec.decode(&replay(&partial), NOW).is_none());
        }
    }

    #[test]
    fn test_duplicated_or_truncated_chunks_are_absent() {
        let codec = codec();
        let cookies = codec
            .encode(&session(6000), &AuthRequest::new(Method::GET, "/"), NOW)
            .unwrap();

        let duplicated = replay(&cookies).with_cookie("appSession.0", cookies[0].value());
        assert!(codec.decode(&duplicated, NOW).is_none());

        let truncated = cookies[..cookies.len() - 1]
            .iter()
            .fold(AuthRequest::new(Method::GET, "/"), |req, c| {
                req.with_cookie(c.name(), c.value())
            })
            .with_cookie(
                cookies[cookies.len() - 1].name(),
                &cookies[cookies.len() - 1].value()[..10],
            );
        assert!(codec.decode(&truncated, NOW).is_none());
    }

    #[test]
    fn test_stale_chunks_cleaned_up() {
        let codec = codec();
        let large = codec
            .encode(&session(6000), &AuthRequest::new(Method::GET, "/"), NOW)
            .unwrap();
        let chunk_count = large.len();

        let cookies = codec.encode(&session(10), &replay(&large), NOW).unwrap();
        assert_eq!(cookies.len(), 1 + chunk_count);
        assert_eq!(cookies[0].name(), "appSession");
        assert!(cookies[1..]
            .iter()
            .all(|c| c.max_age() == Some(Duration::ZERO) && c.name().starts_with("appSession.")));

        let small = codec
            .encode(&session(10), &AuthRequest::new(Method::GET, "/"), NOW)
            .unwrap();
        let cookies = codec.encode(&session(6000), &replay(&small), NOW).unwrap();
        let expired: Vec<_> = cookies
            .iter()
            .filter(|c| c.max_age() == Some(Duration::ZERO))
            .map(Cookie::name)
            .collect();
        assert_eq!(expired, vec!["appSession"]);
    }

    #[test]
    fn test_rolling_expiry() {
        let codec = codec();
        let mut stale = session(10);
        stale.created_at = NOW - 86_401;
        let cookies = codec
            .encode(&stale, &AuthRequest::new(Method::GET, "/"), NOW - 86_401)
            .unwrap();
        assert!(codec.decode(&replay(&cookies), NOW).is_none());
    }

    #[test]
    fn test_absolute_expiry_regardless_of_rolling() {
        let codec = codec();
        let mut old = session(10);
        old.created_at = NOW - 604_801;
        let cookies = codec
            .encode(&old, &AuthRequest::new(Method::GET, "/"), NOW - 10)
            .unwrap();
        assert!(codec.decode(&replay(&cookies), NOW).is_none());
    }

    #[test]
    fn test_rolling_renewal_flag() {
        let codec = codec();
        let cookies = codec
            .encode(&session(10), &AuthRequest::new(Method::GET, "/"), NOW)
            .unwrap();
        let req = replay(&cookies);
        assert!(!codec.decode(&req, NOW + 8_639).unwrap().renew);
        assert!(codec.decode(&req, NOW + 8_640).unwrap().renew);
    }

    #[test]
    fn test_key_rotation() {
        let old_codec = SessionCodec::new(&settings_with(&["old-secret-key"]));
        let cookies = old_codec
            .encode(&session(10), &AuthRequest::new(Method::GET, "/"), NOW)
            .unwrap();

        let rotated = SessionCodec::new(&settings_with(&["new-secret-key", "old-secret-key"]));
        let decoded = rotated.decode(&replay(&cookies), NOW).unwrap();
        assert_eq!(decoded.key_index, 1);
        assert!(decoded.renew);

        let retired = SessionCodec::new(&settings_with(&["new-secret-key"]));
        assert!(retired.decode(&replay(&cookies), NOW).is_none());
    }

    #[test]
    fn test_foreign_or_corrupt_cookie_is_absent() {
        let codec = codec();
        let req = AuthRequest::new(Method::GET, "/").with_cookie("appSession", "garbage");
        assert!(codec.decode(&req, NOW).is_none());
        assert!(codec.is_present(&req));
    }

    #[test]
    fn test_clear_expires_everything_present() {
        let codec = codec();
        let cookies = codec
            .encode(&session(6000), &AuthRequest::new(Method::GET, "/"), NOW)
            .unwrap();
        let cleared = codec.clear(&replay(&cookies));
        assert_eq!(cleared.len(), cookies.len() + 1);
        assert!(cleared.iter().all(|c| c.max_age() == Some(Duration::ZERO)));
    }
}

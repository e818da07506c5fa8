//! Single-use login transaction cookie
//!
//! Login seals the anti-forgery values into a short-lived cookie encrypted
//! under the transient-state key; the callback takes it back exactly once.

use actix_web::cookie::{time::Duration, SameSite};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::request::AuthRequest;
use crate::response::ResponseWriter;
use crate::session::cookie::{build_cookie, CookieFactory, CookieOptions};
use crate::settings::{AuthSettings, ResponseMode};
use crate::utils::crypto::{decrypt_with_keys, derive_keys, encrypt_data, EncryptionKey, KeyPurpose};

/// Lifetime of the transaction cookie, in seconds
pub const TRANSIENT_MAX_AGE: i64 = 600;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransientState {
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_verifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<u64>,
    pub response_type: String,
    pub return_to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_state: Option<Value>,
    pub expires_at: i64,
}

#[derive(Debug, Clone)]
pub struct TransientStore {
    name: String,
    legacy_name: String,
    legacy_enabled: bool,
    keys: Vec<EncryptionKey>,
    cookies: CookieFactory,
}

impl TransientStore {
    #[must_use]
    pub fn new(settings: &AuthSettings) -> Self {
        Self {
            name: settings.transaction_cookie_name.clone(),
            legacy_name: format!("_{}", settings.transaction_cookie_name),
            legacy_enabled: settings.legacy_same_site_cookie,
            keys: derive_keys(&settings.secrets, KeyPurpose::TransientState),
            cookies: CookieFactory::new(&settings.session.cookie),
        }
    }

    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn legacy_cookie_name(&self) -> &str {
        &self.legacy_name
    }

    /// Seal `state` into the transaction cookie.
    ///
    /// `form_post` callbacks are cross-site POSTs, so the cookie goes out as
    /// `SameSite=None; Secure`, with an attribute-less twin for browsers
    /// that reject `None`. Query callbacks use `SameSite=Lax`.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails
    pub fn store(
        &self,
        state: &TransientState,
        mode: ResponseMode,
        req: &AuthRequest,
        res: &mut dyn ResponseWriter,
    ) -> Result<()> {
        let key = self
            .keys
            .first()
            .ok_or_else(|| anyhow::anyhow!("no secret configured"))?;
        let value = encrypt_data(state, key)?;
        let max_age = Some(Duration::seconds(TRANSIENT_MAX_AGE));

        match mode {
            ResponseMode::FormPost => {
                let options = self.options(req, Some(SameSite::None), true, max_age);
                res.set_cookie(build_cookie(&self.name, value.clone(), &options));
                if self.legacy_enabled {
                    let legacy = self.options(req, None, self.cookies.is_secure(req), max_age);
                    res.set_cookie(build_cookie(&self.legacy_name, value, &legacy));
                }
            }
            ResponseMode::Query => {
                let options =
                    self.options(req, Some(SameSite::Lax), self.cookies.is_secure(req), max_age);
                res.set_cookie(build_cookie(&self.name, value, &options));
            }
        }
        Ok(())
    }

    /// Read and clear the transaction cookie.
    ///
    /// The primary cookie is tried first, then the legacy twin. Both are
    /// expired on `res` whatever the outcome, so a replayed callback finds
    /// nothing.
    pub fn take(
        &self,
        req: &AuthRequest,
        res: &mut dyn ResponseWriter,
        now: i64,
    ) -> Option<TransientState> {
        res.remove_cookie(self.removal(&self.name, req));
        if self.legacy_enabled || req.cookie(&self.legacy_name).is_some() {
            res.remove_cookie(self.removal(&self.legacy_name, req));
        }

        let candidates = req
            .cookie_values(&self.name)
            .chain(req.cookie_values(&self.legacy_name));
        for value in candidates {
            match decrypt_with_keys::<TransientState>(value, &self.keys) {
                Some((_, state)) if state.expires_at >= now => return Some(state),
                Some(_) => log::debug!("Transaction cookie expired"),
                None => log::debug!("Transaction cookie could not be opened"),
            }
        }
        None
    }

    fn options(
        &self,
        req: &AuthRequest,
        same_site: Option<SameSite>,
        secure: bool,
        max_age: Option<Duration>,
    ) -> CookieOptions {
        CookieOptions {
            http_only: true,
            secure,
            same_site,
            ..self.cookies.options(req, max_age)
        }
    }

    fn removal(&self, name: &str, req: &AuthRequest) -> actix_web::cookie::Cookie<'static> {
        build_cookie(name, String::new(), &self.options(req, None, false, None))
    }
}

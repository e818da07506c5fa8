use actix_web::cookie::{time::Duration, Cookie, SameSite};

use crate::request::AuthRequest;
use crate::settings::CookieSettings;

/// Per-cookie size budget, including name and attributes
pub const MAX_COOKIE_SIZE: usize = 4096;

/// Attributes for a single cookie
#[derive(Debug, Clone)]
pub struct CookieOptions {
    pub http_only: bool,
    pub secure: bool,
    /// `None` omits the attribute entirely
    pub same_site: Option<SameSite>,
    pub path: String,
    pub domain: Option<String>,
    /// `None` makes a browser-session cookie
    pub max_age: Option<Duration>,
}

/// Builds cookies carrying the configured attributes.
///
/// `secure` follows the configuration when set; otherwise it is forced on
/// for `SameSite=None` and follows the request scheme.
#[derive(Debug, Clone)]
pub struct CookieFactory {
    settings: CookieSettings,
}

impl CookieFactory {
    #[must_use]
    pub fn new(settings: &CookieSettings) -> Self {
        Self {
            settings: settings.clone(),
        }
    }

    #[must_use]
    pub fn is_secure(&self, req: &AuthRequest) -> bool {
        self.settings
            .secure
            .unwrap_or(self.settings.same_site == SameSite::None || req.secure)
    }

    /// Options from configuration for this request, with the given lifetime
    #[must_use]
    pub fn options(&self, req: &AuthRequest, max_age: Option<Duration>) -> CookieOptions {
        CookieOptions {
            http_only: self.settings.http_only,
            secure: self.is_secure(req),
            same_site: Some(self.settings.same_site),
            path: self.settings.path.clone(),
            domain: self.settings.domain.clone(),
            max_age,
        }
    }

    /// Max-Age for a cookie that should live `remaining` more seconds, or
    /// `None` when cookies are configured as transient
    #[must_use]
    pub fn lifetime(&self, remaining: i64) -> Option<Duration> {
        if self.settings.transient {
            None
        } else {
            Some(Duration::seconds(remaining.max(0)))
        }
    }

    /// An expiring cookie whose path and domain match what was set
    #[must_use]
    pub fn expired(&self, name: &str, req: &AuthRequest) -> Cookie<'static> {
        let mut cookie = build_cookie(name, String::new(), &self.options(req, None));
        cookie.make_removal();
        cookie
    }
}

#[must_use]
pub fn build_cookie(name: &str, value: String, options: &CookieOptions) -> Cookie<'static> {
    let mut cookie = Cookie::new(name.to_owned(), value);
    cookie.set_http_only(options.http_only);
    cookie.set_secure(options.secure);
    cookie.set_same_site(options.same_site);
    cookie.set_path(options.path.clone());
    if let Some(domain) = &options.domain {
        cookie.set_domain(domain.clone());
    }
    cookie.set_max_age(options.max_age);
    cookie
}

/// How many value bytes fit in a cookie named `name` with `options`
#[must_use]
pub fn value_budget(name: &str, options: &CookieOptions) -> usize {
    let overhead = build_cookie(name, String::new(), options).to_string().len();
    MAX_COOKIE_SIZE.saturating_sub(overhead)
}

#[must_use]
pub fn chunk_name(base: &str, index: usize) -> String {
    format!("{base}.{index}")
}

/// Index of a chunk cookie belonging to `base`, e.g. `appSession.3` → 3
#[must_use]
pub fn chunk_index(base: &str, name: &str) -> Option<usize> {
    let suffix = name.strip_prefix(base)?.strip_prefix('.')?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::Method;

    fn settings() -> CookieSettings {
        CookieSettings {
            domain: Some("example.com".to_string()),
            path: "/app".to_string(),
            http_only: true,
            secure: None,
            same_site: SameSite::Lax,
            transient: false,
        }
    }

    #[test]
    fn test_secure_follows_request_scheme_when_unset() {
        let factory = CookieFactory::new(&settings());
        let http = AuthRequest::new(Method::GET, "/");
        let https = AuthRequest::new(Method::GET, "/").with_secure(true);
        assert!(!factory.is_secure(&http));
        assert!(factory.is_secure(&https));

        let mut explicit = settings();
        explicit.secure = Some(true);
        assert!(CookieFactory::new(&explicit).is_secure(&http));

        let mut none = settings();
        none.same_site = SameSite::None;
        assert!(CookieFactory::new(&none).is_secure(&http));
    }

    #[test]
    fn test_cookie_attributes() {
        let factory = CookieFactory::new(&settings());
        let req = AuthRequest::new(Method::GET, "/");
        let cookie = build_cookie(
            "appSession",
            "v".to_string(),
            &factory.options(&req, factory.lifetime(120)),
        );

        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/app"));
        assert_eq!(cookie.domain(), Some("example.com"));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(120)));
    }

    #[test]
    fn test_transient_cookies_have_no_max_age() {
        let mut transient = settings();
        transient.transient = true;
        assert_eq!(CookieFactory::new(&transient).lifetime(120), None);
    }

    #[test]
    fn test_expired_cookie_keeps_scope() {
        let factory = CookieFactory::new(&settings());
        let cookie = factory.expired("appSession.1", &AuthRequest::new(Method::GET, "/"));
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.path(), Some("/app"));
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
    }

    #[test]
    fn test_chunk_index() {
        assert_eq!(chunk_index("appSession", "appSession.0"), Some(0));
        assert_eq!(chunk_index("appSession", "appSession.12"), Some(12));
        assert_eq!(chunk_index("appSession", "appSession"), None);
        assert_eq!(chunk_index("appSession", "appSession.+1"), None);
        assert_eq!(chunk_index("appSession", "appSession.x"), None);
        assert_eq!(chunk_index("appSession", "appSessionX.1"), None);
    }

    #[test]
    fn test_value_budget_accounts_for_attributes() {
        let factory = CookieFactory::new(&settings());
        let options = factory.options(&AuthRequest::new(Method::GET, "/"), None);
        let budget = value_budget("appSession", &options);
        let cookie = build_cookie("appSession", "a".repeat(budget), &options);
        assert_eq!(cookie.to_string().len(), MAX_COOKIE_SIZE);
    }
}

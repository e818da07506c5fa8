//! Transport-neutral view of an incoming request
//!
//! Only the parts the session engine reads are captured, so the same logic
//! serves actix handlers and edge-style callers that never see an
//! `HttpRequest`.

use actix_web::http::{header, Method};
use actix_web::HttpRequest;

#[derive(Debug, Clone)]
pub struct AuthRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    /// Every cookie pair in header order; duplicate names are kept
    pub cookies: Vec<(String, String)>,
    /// Whether the request arrived over https
    pub secure: bool,
}

impl AuthRequest {
    #[must_use]
    pub fn new(method: Method, path: &str) -> Self {
        let (path, query) = match path.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (path.to_string(), None),
        };
        Self {
            method,
            path,
            query: query.filter(|q| !q.is_empty()),
            cookies: Vec::new(),
            secure: false,
        }
    }

    /// Capture an actix request, reading every `Cookie` header
    #[must_use]
    pub fn from_http(req: &HttpRequest) -> Self {
        let mut cookies = Vec::new();
        for value in req.headers().get_all(header::COOKIE) {
            match value.to_str() {
                Ok(raw) => cookies.extend(parse_cookie_header(raw)),
                Err(_) => log::debug!("Skipping non-ASCII Cookie header"),
            }
        }

        Self {
            method: req.method().clone(),
            path: req.path().to_string(),
            query: Some(req.query_string().to_string()).filter(|q| !q.is_empty()),
            cookies,
            secure: req.connection_info().scheme() == "https",
        }
    }

    #[must_use]
    pub fn with_cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.push((name.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub const fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// First value for `name`
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Every value sent under `name`
    pub fn cookie_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.cookies
            .iter()
            .filter(move |(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Path plus query string, as the browser requested it
    #[must_use]
    pub fn original_url(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{query}", self.path),
            None => self.path.clone(),
        }
    }
}

/// Split a `Cookie` header into name/value pairs
fn parse_cookie_header(raw: &str) -> impl Iterator<Item = (String, String)> + '_ {
    raw.split(';').filter_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        Some((name.to_string(), value.to_string()))
    })
}

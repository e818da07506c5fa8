//! Transport-neutral response capability
//!
//! The engine writes cookies, redirects and error bodies through
//! [`ResponseWriter`] and never touches a concrete transport type.
//! [`ClassicResponse`] behaves like a mutable server response;
//! [`EdgeResponse`] behaves like an immutable edge response that is rebuilt
//! on redirect.

mod classic;
mod edge;

pub use classic::ClassicResponse;
pub use edge::EdgeResponse;

use actix_web::cookie::Cookie;
use actix_web::http::header::{HeaderMap, HeaderName, HeaderValue};
use actix_web::http::StatusCode;
use actix_web::HttpResponse;

pub trait ResponseWriter: Send {
    /// Queue a cookie, replacing any earlier cookie with the same name
    fn set_cookie(&mut self, cookie: Cookie<'static>);

    /// Queue a cookie without de-duplication
    fn append_cookie(&mut self, cookie: Cookie<'static>);

    /// Expire `cookie` in the browser, keeping its path and domain
    fn remove_cookie(&mut self, mut cookie: Cookie<'static>) {
        cookie.make_removal();
        self.set_cookie(cookie);
    }

    /// Redirect to `location`. Ignored once the response is finalized.
    fn redirect(&mut self, location: &str, status: StatusCode);

    fn set_status(&mut self, status: StatusCode);

    fn status(&self) -> StatusCode;

    fn insert_header(&mut self, name: HeaderName, value: HeaderValue);

    fn header(&self, name: &HeaderName) -> Option<&HeaderValue>;

    /// Write the body and finalize. Ignored once finalized.
    fn end(&mut self, body: String);

    fn is_finalized(&self) -> bool;

    fn body(&self) -> Option<&str>;

    fn cookies(&self) -> &[Cookie<'static>];

    fn take_cookies(&mut self) -> Vec<Cookie<'static>>;
}

/// State common to both transports
#[derive(Debug, Clone)]
struct ResponseParts {
    status: StatusCode,
    headers: HeaderMap,
    cookies: Vec<Cookie<'static>>,
    body: Option<String>,
    finalized: bool,
}

impl Default for ResponseParts {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            body: None,
            finalized: false,
        }
    }
}

impl ResponseParts {
    fn set_cookie(&mut self, cookie: Cookie<'static>) {
        self.cookies.retain(|existing| existing.name() != cookie.name());
        self.cookies.push(cookie);
    }

    fn end(&mut self, body: String) {
        if self.finalized {
            log::debug!("Ignoring body write on a finalized response");
            return;
        }
        self.body = Some(body);
        self.finalized = true;
    }

    fn into_http_response(self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status);
        for (name, value) in &self.headers {
            builder.append_header((name.clone(), value.clone()));
        }
        for cookie in self.cookies {
            builder.cookie(cookie);
        }
        match self.body {
            Some(body) => builder.body(body),
            None => builder.finish(),
        }
    }
}

/// Implements the parts of [`ResponseWriter`] that do not differ by
/// transport. Each transport supplies `redirect`.
macro_rules! delegate_to_parts {
    () => {
        fn set_cookie(&mut self, cookie: actix_web::cookie::Cookie<'static>) {
            self.parts.set_cookie(cookie);
        }

        fn append_cookie(&mut self, cookie: actix_web::cookie::Cookie<'static>) {
            self.parts.cookies.push(cookie);
        }

        fn set_status(&mut self, status: actix_web::http::StatusCode) {
            if !self.parts.finalized {
                self.parts.status = status;
            }
        }

        fn status(&self) -> actix_web::http::StatusCode {
            self.parts.status
        }

        fn insert_header(
            &mut self,
            name: actix_web::http::header::HeaderName,
            value: actix_web::http::header::HeaderValue,
        ) {
            if !self.parts.finalized {
                self.parts.headers.insert(name, value);
            }
        }

        fn header(
            &self,
            name: &actix_web::http::header::HeaderName,
        ) -> Option<&actix_web::http::header::HeaderValue> {
            self.parts.headers.get(name)
        }

        fn end(&mut self, body: String) {
            self.parts.end(body);
        }

        fn is_finalized(&self) -> bool {
            self.parts.finalized
        }

        fn body(&self) -> Option<&str> {
            self.parts.body.as_deref()
        }

        fn cookies(&self) -> &[actix_web::cookie::Cookie<'static>] {
            &self.parts.cookies
        }

        fn take_cookies(&mut self) -> Vec<actix_web::cookie::Cookie<'static>> {
            std::mem::take(&mut self.parts.cookies)
        }
    };
}

pub(crate) use delegate_to_parts;

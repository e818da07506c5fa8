use actix_web::body::BoxBody;
use actix_web::http::header::{self, HeaderValue};
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, Responder};
use askama::Template;

use super::{delegate_to_parts, ResponseParts, ResponseWriter};

/// Fallback body for clients that do not follow `Location`
#[derive(Template)]
#[template(
    source = r#"<p>{{ reason }}. Redirecting to <a href="{{ location }}">{{ location }}</a></p>"#,
    ext = "html"
)]
struct RedirectTemplate<'a> {
    reason: &'a str,
    location: &'a str,
}

/// Mutable request/response style transport.
///
/// Headers written before a redirect are kept, and redirects carry a small
/// HTML body for clients that do not follow `Location`.
#[derive(Debug, Clone, Default)]
pub struct ClassicResponse {
    parts: ResponseParts,
}

impl ClassicResponse {
    #[must_use]
    pub fn into_http_response(self) -> HttpResponse {
        self.parts.into_http_response()
    }
}

impl ResponseWriter for ClassicResponse {
    delegate_to_parts!();

    fn redirect(&mut self, location: &str, status: StatusCode) {
        if self.parts.finalized {
            log::debug!("Ignoring redirect to {location} on a finalized response");
            return;
        }
        let Ok(location_value) = HeaderValue::from_str(location) else {
            log::warn!("Refusing redirect to a location that is not a valid header value");
            self.parts.status = StatusCode::INTERNAL_SERVER_ERROR;
            self.parts.end(String::new());
            return;
        };

        let reason = status.canonical_reason().unwrap_or("Redirecting");
        let body = RedirectTemplate { reason, location }
            .render()
            .unwrap_or_else(|e| {
                log::warn!("Failed to render redirect body: {e}");
                String::new()
            });
        self.parts.status = status;
        self.parts.headers.insert(header::LOCATION, location_value);
        self.parts.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        self.parts.end(body);
    }
}

impl Responder for ClassicResponse {
    type Body = BoxBody;

    fn respond_to(self, _req: &HttpRequest) -> HttpResponse<Self::Body> {
        self.into_http_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::cookie::Cookie;
    use actix_web::http::header::HeaderName;

    #[test]
    fn test_redirect_escapes_fallback_body() {
        let mut res = ClassicResponse::default();
        res.redirect("/next?a=1&b=<x>", StatusCode::FOUND);

        assert!(res.is_finalized());
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(
            res.header(&header::LOCATION).unwrap(),
            "/next?a=1&b=<x>"
        );
        let body = res.body().unwrap();
        assert!(body.starts_with("<p>Found. Redirecting to"));
        assert!(body.contains("/next?a=1&amp;b=&lt;x&gt;"));
        assert!(!body.contains("<x>"));
    }

    #[test]
    fn test_redirect_keeps_existing_headers() {
        let mut res = ClassicResponse::default();
        res.insert_header(
            HeaderName::from_static("x-trace"),
            HeaderValue::from_static("abc"),
        );
        res.redirect("/", StatusCode::SEE_OTHER);
        assert_eq!(
            res.header(&HeaderName::from_static("x-trace")).unwrap(),
            "abc"
        );
    }

    #[test]
    fn test_redirect_is_noop_once_finalized() {
        let mut res = ClassicResponse::default();
        res.set_status(StatusCode::UNAUTHORIZED);
        res.end("done".to_string());
        res.redirect("/elsewhere", StatusCode::FOUND);

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(res.body(), Some("done"));
        assert!(res.header(&header::LOCATION).is_none());
    }

    #[test]
    fn test_into_http_response_carries_cookies() {
        let mut res = ClassicResponse::default();
        res.set_cookie(Cookie::new("a", "1"));
        res.append_cookie(Cookie::new("b", "2"));
        res.redirect("/home", StatusCode::FOUND);

        let http = res.into_http_response();
        assert_eq!(http.status(), StatusCode::FOUND);
        let names: Vec<String> = http.cookies().map(|c| c.name().to_string()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}

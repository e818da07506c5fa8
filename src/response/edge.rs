use actix_web::body::BoxBody;
use actix_web::http::header::{self, HeaderValue};
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, Responder};

use super::{delegate_to_parts, ResponseParts, ResponseWriter};

/// Edge-runtime style transport.
///
/// A redirect replaces the response wholesale: only the queued cookies
/// survive, and no body is written.
#[derive(Debug, Clone, Default)]
pub struct EdgeResponse {
    parts: ResponseParts,
}

impl EdgeResponse {
    #[must_use]
    pub fn into_http_response(self) -> HttpResponse {
        self.parts.into_http_response()
    }
}

impl ResponseWriter for EdgeResponse {
    delegate_to_parts!();

    fn redirect(&mut self, location: &str, status: StatusCode) {
        if self.parts.finalized {
            log::debug!("Ignoring redirect to {location} on a finalized response");
            return;
        }
        let cookies = std::mem::take(&mut self.parts.cookies);
        let mut rebuilt = ResponseParts {
            cookies,
            ..ResponseParts::default()
        };
        match HeaderValue::from_str(location) {
            Ok(value) => {
                rebuilt.status = status;
                rebuilt.headers.insert(header::LOCATION, value);
            }
            Err(_) => {
                log::warn!("Refusing redirect to a location that is not a valid header value");
                rebuilt.status = StatusCode::INTERNAL_SERVER_ERROR;
            }
        }
        rebuilt.finalized = true;
        self.parts = rebuilt;
    }
}

impl Responder for EdgeResponse {
    type Body = BoxBody;

    fn respond_to(self, _req: &HttpRequest) -> HttpResponse<Self::Body> {
        self.into_http_response()
    }
}

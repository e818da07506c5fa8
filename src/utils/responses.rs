//! JSON error bodies shared by the gate and the default error terminator
//!
//! Common bodies are serialized once and reused.

use actix_web::http::StatusCode;
use serde_json::json;

pub const JSON_CONTENT_TYPE: &str = "application/json";

static CACHED_RESPONSES: std::sync::LazyLock<CachedResponses> =
    std::sync::LazyLock::new(CachedResponses::new);

/// Pre-serialized error bodies
struct CachedResponses {
    not_authenticated: String,
    bad_request: String,
    unauthorized: String,
    server_error: String,
    bad_gateway: String,
}

impl CachedResponses {
    fn new() -> Self {
        Self {
            not_authenticated: json!({
                "error": "not_authenticated",
                "description": "Authentication is required to access this resource",
            })
            .to_string(),
            bad_request: error_json("invalid_request", "The request is malformed or invalid"),
            unauthorized: error_json("unauthorized", "The request could not be authenticated"),
            server_error: error_json("server_error", "An internal server error occurred"),
            bad_gateway: error_json(
                "bad_gateway",
                "The identity provider could not be reached",
            ),
        }
    }
}

/// Serialize an OIDC-style error object
#[must_use]
pub fn error_json(error: &str, description: &str) -> String {
    json!({
        "error": error,
        "error_description": description,
    })
    .to_string()
}

/// `{error, description}` body returned by the gate for unauthenticated
/// API requests
#[must_use]
pub fn not_authenticated_body() -> String {
    CACHED_RESPONSES.not_authenticated.clone()
}

/// Generic body for a status code, used when no handler rendered anything.
///
/// The error detail is deliberately not echoed; it is logged instead.
#[must_use]
pub fn generic_status_body(status: StatusCode) -> String {
    let cached = &*CACHED_RESPONSES;
    match status.as_u16() {
        401 => cached.unauthorized.clone(),
        502 => cached.bad_gateway.clone(),
        400..=499 => cached.bad_request.clone(),
        _ => cached.server_error.clone(),
    }
}

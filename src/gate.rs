//! Auth-required gate
//!
//! Wraps an optional downstream handler behind session presence. Session
//! resolution writes to its own response; any cookies it produces (rolling
//! renewal, clearing an unusable cookie) are merged ahead of the handler's
//! cookies so a handler building its own response cannot drop them.

use std::future::Future;

use actix_web::http::header::{self, HeaderValue};
use actix_web::http::StatusCode;

use crate::models::Session;
use crate::request::AuthRequest;
use crate::response::ResponseWriter;
use crate::session::SessionManager;
use crate::utils::responses::{not_authenticated_body, JSON_CONTENT_TYPE};

/// Downstream type for [`AuthGate::handle`] calls without a handler
pub type NoHandler<R> = fn(AuthRequest, Option<Session>) -> std::future::Ready<R>;

/// What the gate decided for a request
#[derive(Debug)]
pub enum GateOutcome<R> {
    /// Path is not protected; the session was not resolved
    Exempt,
    /// No usable session; `R` holds the finished 401 or login redirect
    Denied(R),
    /// Session present; `resolution` holds any cookies written while
    /// resolving it
    Allowed { resolution: R, session: Session },
}

#[derive(Debug, Clone)]
pub struct AuthGate {
    sessions: SessionManager,
}

impl AuthGate {
    #[must_use]
    pub const fn new(sessions: SessionManager) -> Self {
        Self { sessions }
    }

    /// Login and callback routes, plus configured exempt prefixes
    #[must_use]
    pub fn is_exempt(&self, path: &str) -> bool {
        let settings = self.sessions.settings();
        path == settings.routes.login
            || path == settings.routes.callback
            || settings
                .gate
                .exempt_prefixes
                .iter()
                .any(|prefix| matches_prefix(path, prefix))
    }

    /// Paths answered with a JSON 401 instead of a login redirect
    #[must_use]
    pub fn is_api_path(&self, path: &str) -> bool {
        self.sessions
            .settings()
            .gate
            .api_prefixes
            .iter()
            .any(|prefix| matches_prefix(path, prefix))
    }

    /// Resolve the session for `req` and decide.
    #[must_use]
    pub fn evaluate<R: ResponseWriter + Default>(&self, req: &AuthRequest) -> GateOutcome<R> {
        if self.is_exempt(&req.path) {
            log::debug!("Gate skipped for exempt path {}", req.path);
            return GateOutcome::Exempt;
        }

        let mut resolution = R::default();
        let mut current = self.sessions.for_request(req);
        let session = current.get().cloned();
        if let Err(err) = current.save(&mut resolution) {
            log::error!("Failed to write session cookies for {}: {err}", req.path);
        }

        match session {
            Some(session) => GateOutcome::Allowed {
                resolution,
                session,
            },
            None => {
                self.deny(req, &mut resolution);
                GateOutcome::Denied(resolution)
            }
        }
    }

    /// Run `downstream` if `req` is authenticated or exempt.
    ///
    /// Without a downstream handler an authenticated request gets the
    /// resolution response as is, an exempt one an empty 200.
    pub async fn handle<R, F, Fut>(&self, req: &AuthRequest, downstream: Option<F>) -> R
    where
        R: ResponseWriter + Default,
        F: FnOnce(AuthRequest, Option<Session>) -> Fut,
        Fut: Future<Output = R>,
    {
        match self.evaluate::<R>(req) {
            GateOutcome::Exempt => match downstream {
                Some(handler) => handler(req.clone(), None).await,
                None => R::default(),
            },
            GateOutcome::Denied(res) => res,
            GateOutcome::Allowed {
                resolution,
                session,
            } => match downstream {
                Some(handler) => {
                    let handled = handler(req.clone(), Some(session)).await;
                    merge_cookies(resolution, handled)
                }
                None => resolution,
            },
        }
    }

    fn deny(&self, req: &AuthRequest, res: &mut dyn ResponseWriter) {
        let settings = self.sessions.settings();
        if settings.error_on_required_auth || self.is_api_path(&req.path) {
            log::debug!("Rejecting unauthenticated request to {}", req.path);
            res.set_status(StatusCode::UNAUTHORIZED);
            res.insert_header(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
            res.end(not_authenticated_body());
        } else {
            let location = format!(
                "{}?returnTo={}",
                settings.routes.login,
                urlencoding::encode(&req.original_url())
            );
            log::debug!("Redirecting unauthenticated request to {location}");
            res.redirect(&location, StatusCode::FOUND);
        }
    }
}

/// Resolution cookies first, then the handler's
fn merge_cookies<R: ResponseWriter>(mut resolution: R, mut handled: R) -> R {
    let downstream = handled.take_cookies();
    for cookie in resolution.take_cookies().into_iter().chain(downstream) {
        handled.append_cookie(cookie);
    }
    handled
}

/// `prefix` itself or anything below it; `/api` does not match `/apiary`
fn matches_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_prefix() {
        assert!(matches_prefix("/api", "/api"));
        assert!(matches_prefix("/api/private", "/api"));
        assert!(matches_prefix("/api/private", "/api/"));
        assert!(matches_prefix("/anything", "/"));
        assert!(!matches_prefix("/apiary", "/api"));
        assert!(!matches_prefix("/private", "/api"));
    }
}

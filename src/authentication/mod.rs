//! Authentication state machine
//!
//! Drives the `Anonymous -> LoginInitiated -> CallbackPending -> Authenticated`
//! and `Authenticated -> LogoutInitiated -> Anonymous` transitions. Each
//! operation writes to a [`ResponseWriter`] and reports failures as an
//! [`AuthError`]; [`OidcAuth::finish`] routes those through the configured
//! [`ErrorHandler`] and guarantees the response is completed.
//!
//! Organization:
//! - `login` builds the authorization request and the transaction cookie
//! - `callback` checks the provider response and creates the session
//! - `logout` clears the session, optionally via the provider
//! - `refresh` re-fetches tokens and claims with a refresh token

pub mod error_handler;
pub mod errors;

mod callback;
mod login;
mod logout;
mod refresh;

pub use callback::CallbackOutcome;
pub use error_handler::{terminate, Completion, DefaultErrorHandler, ErrorHandler};
pub use errors::{AuthError, ErrorCause};
pub use login::LoginOptions;
pub use logout::LogoutOptions;

use std::future::Future;
use std::sync::Arc;

use actix_web::http::StatusCode;

use crate::gate::AuthGate;
use crate::oauth::{OidcClient, OidcClientError, TransientStore};
use crate::request::AuthRequest;
use crate::response::ResponseWriter;
use crate::session::{RequestSession, SessionManager};
use crate::settings::AuthSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    /// Redirect to the authorization endpoint issued
    LoginInitiated,
    /// A login transaction cookie is in flight
    CallbackPending,
    Authenticated,
    /// Redirect to the provider's end-session endpoint issued
    LogoutInitiated,
}

/// Entry point for login, callback, logout and refresh.
///
/// Cheap to clone. Holds the validated settings, the session store, the
/// transaction cookie store and the two collaborators.
#[derive(Clone)]
pub struct OidcAuth {
    settings: Arc<AuthSettings>,
    sessions: SessionManager,
    transient: Arc<TransientStore>,
    client: Arc<dyn OidcClient>,
    error_handler: Arc<dyn ErrorHandler>,
}

impl std::fmt::Debug for OidcAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcAuth")
            .field("client_id", &self.settings.client_id)
            .field("base_url", &self.settings.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl OidcAuth {
    #[must_use]
    pub fn new(settings: AuthSettings, client: Arc<dyn OidcClient>) -> Self {
        let settings = Arc::new(settings);
        Self {
            sessions: SessionManager::new(Arc::clone(&settings)),
            transient: Arc::new(TransientStore::new(&settings)),
            settings,
            client,
            error_handler: Arc::new(DefaultErrorHandler),
        }
    }

    /// Replace the default error handler
    #[must_use]
    pub fn with_error_handler(mut self, handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = handler;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    #[must_use]
    pub fn transient(&self) -> &TransientStore {
        &self.transient
    }

    /// Request-scoped session view
    #[must_use]
    pub fn session(&self, req: &AuthRequest) -> RequestSession {
        self.sessions.for_request(req)
    }

    /// Auth-required gate sharing this instance's session store
    #[must_use]
    pub fn gate(&self) -> AuthGate {
        AuthGate::new(self.sessions.clone())
    }

    /// Where `req` stands in the login flow
    #[must_use]
    pub fn current_state(&self, req: &AuthRequest) -> AuthState {
        if self.session(req).is_authenticated() {
            AuthState::Authenticated
        } else if req.cookie(self.transient.cookie_name()).is_some()
            || req.cookie(self.transient.legacy_cookie_name()).is_some()
        {
            AuthState::CallbackPending
        } else {
            AuthState::Anonymous
        }
    }

    /// Complete `res` for a flow result.
    ///
    /// On failure the error handler runs first. If it reports the error as
    /// unhandled, the default terminator renders the error's status. If it
    /// claims to have handled the error but left the response open, the
    /// terminator closes it with a 500.
    pub async fn finish<T>(
        &self,
        req: &AuthRequest,
        res: &mut dyn ResponseWriter,
        result: Result<T, AuthError>,
    ) -> Option<T> {
        let err = match result {
            Ok(value) => return Some(value),
            Err(err) => err,
        };

        match self.error_handler.handle(req, res, &err).await {
            Completion::Unhandled => terminate(res, &err),
            Completion::Handled if !res.is_finalized() => {
                log::warn!("Error handler did not complete the response for {}", req.path);
                terminate(
                    res,
                    &AuthError::Upstream {
                        status: StatusCode::INTERNAL_SERVER_ERROR,
                        error: "server_error".to_string(),
                        description: "error handler left the response open".to_string(),
                    },
                );
            }
            Completion::Handled => {}
        }
        None
    }

    /// Await a collaborator call within `http_timeout`
    async fn bounded<T, F>(&self, operation: &str, call: F) -> Result<T, AuthError>
    where
        F: Future<Output = Result<T, OidcClientError>>,
    {
        let limit = self.settings.http_timeout;
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result.map_err(|err| {
                if err.is_client_attributable() {
                    log::warn!("{operation} rejected: {err}");
                } else {
                    log::error!("{operation} failed: {err}");
                }
                AuthError::from(err)
            }),
            Err(_) => {
                log::error!("{operation} timed out after {}ms", limit.as_millis());
                Err(AuthError::timeout(operation, limit.as_millis()))
            }
        }
    }
}

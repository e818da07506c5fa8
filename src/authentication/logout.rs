use actix_web::http::StatusCode;

use super::{AuthError, AuthState, OidcAuth};
use crate::oauth::EndSessionParams;
use crate::request::AuthRequest;
use crate::response::ResponseWriter;
use crate::utils::redirect_validator::validate_return_to;

#[derive(Debug, Clone, Default)]
pub struct LogoutOptions {
    /// Post-logout target; relative or same-origin. Defaults to the
    /// configured post-logout redirect, then `base_url`.
    pub return_to: Option<String>,
}

impl OidcAuth {
    /// Clear the session and redirect.
    ///
    /// With `idp_logout` enabled and a session present, the redirect goes to
    /// the provider's end-session endpoint, which sends the browser on to the
    /// post-logout target.
    ///
    /// # Errors
    ///
    /// Returns an error if the `return_to` override fails redirect
    /// validation or the provider has no end-session endpoint.
    pub fn logout(
        &self,
        req: &AuthRequest,
        res: &mut dyn ResponseWriter,
        options: LogoutOptions,
    ) -> Result<AuthState, AuthError> {
        let return_to = match options.return_to.as_deref() {
            Some(target) => self
                .settings
                .absolute_url(&validate_return_to(target, &self.settings.base_url)?),
            None => self.settings.post_logout_redirect(),
        };

        let mut session = self.sessions.for_request(req);
        let previous = session.get().map(|s| s.id_token.clone());
        session.delete();
        session.save(res)?;

        let Some(id_token_hint) = previous else {
            log::debug!("Logout without a session, redirecting to {return_to}");
            res.redirect(&return_to, StatusCode::FOUND);
            return Ok(AuthState::Anonymous);
        };

        if self.settings.idp_logout {
            let location = self.client.end_session_url(&EndSessionParams {
                id_token_hint,
                post_logout_redirect_uri: return_to,
            })?;
            res.redirect(&location, StatusCode::FOUND);
            return Ok(AuthState::LogoutInitiated);
        }

        res.redirect(&return_to, StatusCode::FOUND);
        Ok(AuthState::Anonymous)
    }
}

use std::collections::BTreeMap;

use actix_web::http::StatusCode;
use serde_json::Value;

use super::{AuthError, AuthState, OidcAuth};
use crate::models::now_epoch;
use crate::oauth::{AuthorizationParams, ResolvedParams, TransientState, TRANSIENT_MAX_AGE};
use crate::request::AuthRequest;
use crate::response::ResponseWriter;
use crate::session::SessionError;
use crate::utils::crypto::{code_challenge, generate_code_verifier, generate_nonce, generate_state};
use crate::utils::redirect_validator::validate_return_to;

/// Caller choices for a single login
#[derive(Debug, Clone, Default)]
pub struct LoginOptions {
    /// Post-login target; relative or same-origin. Defaults to `/`.
    pub return_to: Option<String>,
    /// Overrides merged over the configured authorization parameters
    pub authorization_params: BTreeMap<String, String>,
    /// Opaque value handed back after the callback
    pub app_state: Option<Value>,
}

impl OidcAuth {
    /// Start a login: seal the transaction cookie and redirect to the
    /// authorization endpoint.
    ///
    /// A `nonce` is generated when the response type returns an ID token
    /// from the authorization endpoint, a PKCE pair when it returns a code.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The overrides are invalid or touch reserved parameters
    /// - `return_to` fails redirect validation
    /// - The client cannot build the authorization URL
    /// - The transaction cookie cannot be sealed
    pub fn login(
        &self,
        req: &AuthRequest,
        res: &mut dyn ResponseWriter,
        options: LoginOptions,
    ) -> Result<AuthState, AuthError> {
        let resolved = ResolvedParams::merge(&self.settings, &options.authorization_params)?;
        let return_to = validate_return_to(
            options.return_to.as_deref().unwrap_or("/"),
            &self.settings.base_url,
        )?;

        let state = generate_state();
        let nonce = resolved.response_type.includes_id_token().then(generate_nonce);
        let code_verifier = resolved.response_type.includes_code().then(generate_code_verifier);

        let params = AuthorizationParams {
            client_id: self.settings.client_id.clone(),
            redirect_uri: self.settings.redirect_uri(),
            response_type: resolved.response_type,
            response_mode: resolved.response_mode,
            scope: resolved.scope,
            state: state.clone(),
            nonce: nonce.clone(),
            code_challenge: code_verifier.as_deref().map(code_challenge),
            max_age: resolved.max_age,
            extra: resolved.extra,
        };
        let location = self.client.authorization_url(&params)?;

        let transaction = TransientState {
            state,
            nonce,
            code_verifier,
            max_age: params.max_age,
            response_type: params.response_type.as_str().to_string(),
            return_to,
            app_state: options.app_state,
            expires_at: now_epoch() + TRANSIENT_MAX_AGE,
        };
        self.transient
            .store(&transaction, params.response_mode, req, res)
            .map_err(SessionError::from)?;

        log::debug!(
            "Login started ({} via {}), returning to {}",
            params.response_type.as_str(),
            params.response_mode.as_str(),
            transaction.return_to
        );
        res.redirect(&location, StatusCode::FOUND);
        Ok(AuthState::LoginInitiated)
    }
}

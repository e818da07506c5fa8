use actix_web::http::StatusCode;
use serde_json::Value;

use super::{AuthError, AuthState, OidcAuth};
use crate::models::{filter_claims, now_epoch, Claims, Session};
use crate::oauth::{CallbackParams, IdTokenChecks, TokenSet, TransientState};
use crate::request::AuthRequest;
use crate::response::ResponseWriter;
use crate::settings::ResponseType;
use crate::utils::crypto::constant_time_eq;
use crate::utils::redirect_validator::validate_return_to;

/// Result of a successful callback
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackOutcome {
    pub state: AuthState,
    pub return_to: String,
    pub app_state: Option<Value>,
}

impl OidcAuth {
    /// Finish a login from the provider's response.
    ///
    /// The transaction cookie is consumed before anything else, so a
    /// replayed or failed callback cannot be retried with it.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The provider returned an `error` parameter
    /// - The transaction cookie is missing, expired or does not match `state`
    /// - A required `code` or `id_token` is missing
    /// - ID token validation or the code exchange fails or times out
    /// - The session cookie cannot be written
    pub async fn callback(
        &self,
        req: &AuthRequest,
        res: &mut dyn ResponseWriter,
        params: CallbackParams,
    ) -> Result<CallbackOutcome, AuthError> {
        let now = now_epoch();
        let transaction = self.transient.take(req, res, now);

        if let Some(error) = params.error.as_deref() {
            return Err(AuthError::callback(
                error,
                params.error_description.clone().unwrap_or_default(),
            ));
        }
        let transaction = check_state(transaction, params.state.as_deref())?;
        let response_type = ResponseType::parse(&transaction.response_type).ok_or_else(|| {
            AuthError::callback("invalid_state", "transaction carries an unknown response type")
        })?;

        let checks = IdTokenChecks {
            nonce: transaction.nonce.clone(),
            max_age: transaction.max_age,
            clock_tolerance: self.settings.clock_tolerance,
            signing_alg: self.settings.id_token_signing_alg.clone(),
        };

        let mut tokens = TokenSet::default();
        let mut claims: Option<Claims> = None;

        if response_type.includes_id_token() {
            let id_token = params.id_token.as_deref().ok_or_else(|| {
                AuthError::callback("invalid_request", "id_token missing from the response")
            })?;
            claims = Some(
                self.bounded("ID token validation", self.client.validate_id_token(id_token, &checks))
                    .await?,
            );
            tokens.id_token = Some(id_token.to_string());
        }

        if response_type.includes_code() {
            let code = params.code.as_deref().ok_or_else(|| {
                AuthError::callback("invalid_request", "code missing from the response")
            })?;
            let redirect_uri = self.settings.redirect_uri();
            let exchanged = self
                .bounded(
                    "token exchange",
                    self.client
                        .exchange_code(code, transaction.code_verifier.as_deref(), &redirect_uri),
                )
                .await?;
            if let Some(id_token) = exchanged.id_token.as_deref() {
                claims = Some(
                    self.bounded(
                        "ID token validation",
                        self.client.validate_id_token(id_token, &checks),
                    )
                    .await?,
                );
            }
            tokens = TokenSet {
                id_token: exchanged.id_token.or(tokens.id_token),
                ..exchanged
            };
        }

        let claims = claims.ok_or_else(|| {
            AuthError::callback("invalid_request", "no ID token was returned")
        })?;
        let return_to = validate_return_to(&transaction.return_to, &self.settings.base_url)?;

        let mut session = Session::new(
            filter_claims(claims, &self.settings.identity_claim_filter),
            now,
        );
        session.id_token = tokens.id_token;
        session.access_token = tokens.access_token;
        session.refresh_token = tokens.refresh_token;
        session.token_type = tokens.token_type;
        session.expires_at = tokens.expires_at;

        log::info!(
            "Login completed for subject {}",
            session.subject().unwrap_or("<none>")
        );

        let mut current = self.sessions.for_request_at(req, now);
        current.set(session);
        current.save(res)?;
        res.redirect(&return_to, StatusCode::FOUND);

        Ok(CallbackOutcome {
            state: AuthState::Authenticated,
            return_to,
            app_state: transaction.app_state,
        })
    }
}

/// Fail closed unless both sides carry the same `state`
fn check_state(
    transaction: Option<TransientState>,
    returned: Option<&str>,
) -> Result<TransientState, AuthError> {
    let transaction = transaction.ok_or_else(|| {
        AuthError::callback("invalid_state", "login transaction missing or expired")
    })?;
    let returned = returned
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AuthError::callback("invalid_state", "state missing from the response"))?;
    if !constant_time_eq(returned, &transaction.state) {
        log::warn!("Callback state does not match the login transaction");
        return Err(AuthError::callback("invalid_state", "state mismatch"));
    }
    Ok(transaction)
}

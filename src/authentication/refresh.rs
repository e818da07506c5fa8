use super::{AuthError, AuthState, OidcAuth};
use crate::models::filter_claims;
use crate::oauth::IdTokenChecks;
use crate::session::RequestSession;

impl OidcAuth {
    /// Exchange the session's refresh token for fresh tokens and claims.
    ///
    /// The updated session is staged on `session`; call
    /// [`RequestSession::save`] to write it. A refresh token the provider
    /// does not rotate is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no session or refresh token, or if the
    /// provider rejects the refresh or returns an invalid ID token.
    pub async fn refresh(&self, session: &mut RequestSession) -> Result<AuthState, AuthError> {
        let Some(mut updated) = session.get().cloned() else {
            return Err(AuthError::InvalidRequest("no session to refresh".to_string()));
        };
        let Some(refresh_token) = updated.refresh_token.clone() else {
            return Err(AuthError::InvalidRequest(
                "session has no refresh token".to_string(),
            ));
        };

        let tokens = self
            .bounded("token refresh", self.client.refresh(&refresh_token))
            .await?;

        if let Some(id_token) = tokens.id_token.as_deref() {
            let checks = IdTokenChecks {
                nonce: None,
                max_age: None,
                clock_tolerance: self.settings.clock_tolerance,
                signing_alg: self.settings.id_token_signing_alg.clone(),
            };
            updated.user = self
                .bounded("ID token validation", self.client.validate_id_token(id_token, &checks))
                .await?;
            updated.id_token = Some(id_token.to_string());
        }
        updated.user = filter_claims(updated.user, &self.settings.identity_claim_filter);

        if let Some(access_token) = tokens.access_token {
            updated.access_token = Some(access_token);
            updated.expires_at = tokens.expires_at;
            if tokens.token_type.is_some() {
                updated.token_type = tokens.token_type;
            }
        }
        if let Some(rotated) = tokens.refresh_token {
            updated.refresh_token = Some(rotated);
        }

        log::debug!(
            "Refreshed tokens for subject {}",
            updated.subject().unwrap_or("<none>")
        );
        session.set(updated);
        Ok(AuthState::Authenticated)
    }
}

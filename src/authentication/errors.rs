use actix_web::http::StatusCode;
use serde::Serialize;

use crate::oauth::{OidcClientError, ParamsError};
use crate::session::SessionError;
use crate::utils::redirect_validator::RedirectError;

/// OIDC-style error object
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorCause {
    pub error: String,
    pub error_description: String,
}

/// A failed login, callback, logout or refresh
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The callback did not match the login that started it, or the
    /// provider reported an error
    #[error("callback validation failed ({error}): {description}")]
    CallbackValidation { error: String, description: String },

    /// The OIDC client collaborator failed or timed out
    #[error("identity provider request failed ({error}): {description}")]
    Upstream {
        status: StatusCode,
        error: String,
        description: String,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl AuthError {
    pub(crate) fn callback(error: &str, description: impl Into<String>) -> Self {
        Self::CallbackValidation {
            error: error.to_string(),
            description: description.into(),
        }
    }

    pub(crate) fn timeout(operation: &str, limit_ms: u128) -> Self {
        Self::Upstream {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: "timeout".to_string(),
            description: format!("{operation} timed out after {limit_ms}ms"),
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::CallbackValidation { .. } | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Upstream { status, .. } => *status,
            Self::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub fn cause(&self) -> ErrorCause {
        let (error, description) = match self {
            Self::CallbackValidation { error, description }
            | Self::Upstream {
                error, description, ..
            } => (error.clone(), description.clone()),
            Self::InvalidRequest(message) => ("invalid_request".to_string(), message.clone()),
            Self::Session(err) => ("server_error".to_string(), err.to_string()),
        };
        ErrorCause {
            error,
            error_description: description,
        }
    }
}

impl From<OidcClientError> for AuthError {
    fn from(err: OidcClientError) -> Self {
        match err {
            OidcClientError::IdToken(message) => Self::callback("invalid_id_token", message),
            OidcClientError::Rejected { error, description } => Self::Upstream {
                status: StatusCode::BAD_REQUEST,
                description: description.unwrap_or_else(|| error.clone()),
                error,
            },
            OidcClientError::Transport(message) | OidcClientError::Configuration(message) => {
                Self::Upstream {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    error: "upstream_error".to_string(),
                    description: message,
                }
            }
        }
    }
}

impl From<ParamsError> for AuthError {
    fn from(err: ParamsError) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}

impl From<RedirectError> for AuthError {
    fn from(err: RedirectError) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}

//! OpenID Connect protocol pieces
//!
//! The provider-facing client is a collaborator trait; this module owns the
//! parameters sent to it and the transaction cookie that binds a callback to
//! the login that started it.

pub mod client;
pub mod params;
pub mod transient;

pub use client::{EndSessionParams, IdTokenChecks, OidcClient, OidcClientError, TokenSet};
pub use params::{AuthorizationParams, ParamsError, ResolvedParams};
pub use transient::{TransientState, TransientStore, TRANSIENT_MAX_AGE};

use serde::Deserialize;

/// Parameters the provider sends back to the callback route, from the query
/// string or a `form_post` body
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub id_token: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

/// Version of the oidc-session library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod authentication;
pub mod gate;
pub mod handlers;
pub mod models;
pub mod oauth;
pub mod request;
pub mod response;
pub mod session;
pub mod settings;
pub mod utils;

// Test utilities for unit tests and, behind `testing`, integration tests
#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use authentication::{AuthError, AuthState, ErrorHandler, LoginOptions, LogoutOptions, OidcAuth};
pub use gate::{AuthGate, GateOutcome, NoHandler};
pub use models::Session;
pub use oauth::{CallbackParams, OidcClient};
pub use request::AuthRequest;
pub use response::{ClassicResponse, EdgeResponse, ResponseWriter};
pub use session::SessionManager;
pub use settings::AuthSettings;

//! Test helpers shared by unit and integration tests
//!
//! ## Organization
//!
//! - [`fixtures`] - Pre-built settings, sessions and requests
//! - [`mock`] - A scriptable [`OidcClient`](crate::oauth::OidcClient)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use oidc_session::testing::{fixtures::TestFixtures, mock::MockOidcClient};
//!
//! let client = Arc::new(MockOidcClient::new());
//! let auth = TestFixtures::auth(TestFixtures::settings(), client.clone());
//! assert_eq!(auth.settings().client_id, "test-client");
//! ```

pub mod fixtures;
pub mod mock;

pub use fixtures::TestFixtures;
pub use mock::MockOidcClient;

/// Common test constants
pub mod constants {
    /// Session secret, long enough to pass validation
    pub const TEST_SECRET: &str = "test-secret-at-least-32-characters!!";

    /// A second secret, for key rotation tests
    pub const TEST_ROTATED_SECRET: &str = "rotated-secret-at-least-32-characters";

    pub const TEST_BASE_URL: &str = "https://app.example.com";

    pub const TEST_ISSUER: &str = "https://op.example.com";

    pub const TEST_CLIENT_ID: &str = "test-client";

    pub const TEST_CLIENT_SECRET: &str = "test-client-secret";

    /// Subject of the mock provider's user
    pub const TEST_SUBJECT: &str = "user-123";

    pub const TEST_EMAIL: &str = "test@example.com";
}

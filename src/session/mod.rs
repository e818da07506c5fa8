//! Session storage
//!
//! - [`codec`] - encrypts, chunks and expires the session cookie
//! - [`manager`] - request-scoped, memoized access to the session
//! - [`cookie`] - cookie attributes and chunk naming
//! - [`validation`] - rolling and absolute expiry rules

pub mod codec;
pub mod cookie;
pub mod manager;
pub mod validation;

pub use codec::{DecodedSession, SessionCodec};
pub use cookie::{CookieFactory, CookieOptions, MAX_COOKIE_SIZE};
pub use manager::{RequestSession, SessionError, SessionManager};

//! Authentication: identities and bearer token verification
//!
//! The credential service itself (password storage, login) is external.
//! This module consumes its output: a signed, time-limited token carrying
//! the user's identity claim, checked once per connection during the
//! handshake.

pub mod identity;
pub mod token;

pub use identity::Identity;
pub use token::{AuthError, Claims, JwtIssuer, JwtVerifier, TokenVerifier, SECRET_ENV_VAR};

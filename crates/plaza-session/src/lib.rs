//! Per-connection sessions for Plaza.
//!
//! This crate drives one connection from handshake to goodbye:
//!
//! 1. **Identity**: who the user is ([`IdentityVerifier`], [`JwtVerifier`])
//! 2. **Placement**: which space they enter and where they spawn
//!    ([`SpaceDirectory`], [`Session::handle_join`])
//! 3. **Movement**: one validated step at a time ([`Session::handle_move`])
//! 4. **Departure**: exactly-once cleanup ([`Session::handle_disconnect`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Gateway (above)  ← decodes frames, owns one Session per connection
//!     ↕
//! Session Layer (this crate)  ← identity, state machine, move handling
//!     ↕
//! Room Layer (below)  ← membership and fan-out per space
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod error;
mod jwt;
mod session;

pub use auth::{Identity, IdentityVerifier, SpaceDirectory, StaticSpaces, StaticVerifier};
pub use error::SessionError;
pub use jwt::JwtVerifier;
pub use session::{Session, SessionState};

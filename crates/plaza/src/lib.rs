//! # Plaza
//!
//! Real-time presence and movement gateway for shared 2D spaces.
//!
//! Clients connect over WebSocket, join a space with a bearer token, and
//! step around a grid one cell at a time. Plaza validates every step and
//! fans arrivals, moves and departures out to everyone else in the same
//! space.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use plaza::prelude::*;
//!
//! # async fn start() -> Result<(), PlazaError> {
//! let spaces = StaticSpaces::new().with_space("lobby", SpaceBounds::new(100, 200));
//! let server = PlazaServer::<JwtVerifier, StaticSpaces, _>::builder()
//!     .bind("0.0.0.0:3001")
//!     .build(JwtVerifier::new("shared-secret"), spaces)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::PlazaError;
pub use server::{PlazaServer, PlazaServerBuilder, ServerHandle};

/// Everything needed to stand up a server.
pub mod prelude {
    pub use crate::{PlazaError, PlazaServer, PlazaServerBuilder, ServerHandle};
    pub use plaza_protocol::{
        ClientMessage, MoveTarget, Occupant, Position, ServerMessage, SpaceBounds, SpaceId,
        UserId,
    };
    pub use plaza_room::{RoomConfig, RoomRegistry};
    pub use plaza_session::{
        Identity, IdentityVerifier, JwtVerifier, SessionError, SpaceDirectory, StaticSpaces,
        StaticVerifier,
    };
}

//! Wire protocol for Plaza.
//!
//! This crate defines the "language" that clients and the server speak:
//!
//! - **Identifiers** ([`SessionId`], [`UserId`], [`SpaceId`]) and grid
//!   geometry ([`Position`], [`MoveTarget`], [`SpaceBounds`]).
//! - **Messages** ([`ClientMessage`], [`ServerMessage`], [`Occupant`]):
//!   the `{ type, payload }` frames that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (messages) → Session (state machine) → Room Registry
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientMessage, MoveTarget, Occupant, Position, ServerMessage, SessionId,
    SpaceBounds, SpaceId, UserId,
};

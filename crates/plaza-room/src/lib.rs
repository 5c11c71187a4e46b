//! Room membership and movement rules for Plaza.
//!
//! Every occupied space is served by one room actor: an isolated Tokio
//! task that owns the space's member set and fans events out to each
//! member's outbox. The [`RoomRegistry`] finds or creates rooms, and
//! rooms retire themselves when their last member leaves.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: join, leave, depart, broadcast, occupants
//! - [`Member`]: a session's entry in a room (identity, live position, outbox)
//! - [`MoveVerdict`] / [`judge_move`]: the one-step movement rule
//! - [`RoomConfig`]: channel sizing and retry limits

mod config;
mod error;
mod member;
mod movement;
mod registry;
mod room;

pub use config::RoomConfig;
pub use error::RoomError;
pub use member::{Member, Outbox};
pub use movement::{MoveVerdict, is_legal_move, judge_move};
pub use registry::RoomRegistry;

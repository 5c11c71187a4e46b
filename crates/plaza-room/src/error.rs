//! Error types for the room layer.

use plaza_protocol::SpaceId;

/// Errors that can occur during room operations.
///
/// Expected conditions (an unknown space, removing an absent session,
/// broadcasting into an empty room) are not errors; they are no-ops.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room's actor could not be reached, even after retrying
    /// against a freshly created room.
    #[error("room {0} is unavailable")]
    Unavailable(SpaceId),
}

//! Error types for the session layer.

use plaza_protocol::SpaceId;
use plaza_room::RoomError;

/// Errors that can occur while driving a session.
///
/// `AuthFailed` and `SpaceNotFound` are fatal: the session closes and the
/// gateway drops the connection. The rest are reported and the session
/// carries on.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The token was malformed, forged, or expired.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The space directory has no such space.
    #[error("space {0} not found")]
    SpaceNotFound(SpaceId),

    /// A move arrived before a successful join, or after close.
    #[error("session is not in a space")]
    NotActive,

    /// A join arrived on a session that is already in a space.
    #[error("session already joined a space")]
    AlreadyJoined,

    /// The room layer could not admit the session.
    #[error(transparent)]
    Room(#[from] RoomError),
}

impl SessionError {
    /// Returns `true` if the session cannot continue after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AuthFailed(_) | Self::SpaceNotFound(_) | Self::Room(_)
        )
    }
}

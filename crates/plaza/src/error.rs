//! Unified error type for Plaza.

use plaza_protocol::ProtocolError;
use plaza_room::RoomError;
use plaza_session::SessionError;
use plaza_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impls, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum PlazaError {
    /// Binding, accepting, sending or receiving failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session ended abnormally (bad token, unknown space).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The room layer could not be reached.
    #[error(transparent)]
    Room(#[from] RoomError),
}

#[cfg(test)]
mod tests {
    use plaza_protocol::SpaceId;
    use plaza_transport::ConnectionId;

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::Closed(ConnectionId::new(7));
        let plaza_err: PlazaError = err.into();
        assert!(matches!(plaza_err, PlazaError::Transport(_)));
        assert!(plaza_err.to_string().contains("conn-7"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidDimensions("0x0".into());
        let plaza_err: PlazaError = err.into();
        assert!(matches!(plaza_err, PlazaError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::AuthFailed("nope".into());
        let plaza_err: PlazaError = err.into();
        assert!(matches!(plaza_err, PlazaError::Session(_)));
    }

    #[test]
    fn test_from_room_error() {
        let err = RoomError::Unavailable(SpaceId::from("s1"));
        let plaza_err: PlazaError = err.into();
        assert!(matches!(plaza_err, PlazaError::Room(_)));
        assert!(plaza_err.to_string().contains("s1"));
    }
}

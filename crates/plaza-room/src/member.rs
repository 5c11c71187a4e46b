//! What the registry knows about one session in a room.

use plaza_protocol::{Occupant, Position, ServerMessage, SessionId, UserId};
use tokio::sync::{mpsc, watch};

/// Channel for delivering outbound messages to one connection.
///
/// Unbounded so that enqueueing never blocks a room: a slow client only
/// grows its own queue, it never stalls a broadcast.
pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

/// A session's entry in a room's member set.
///
/// The position is a read-only view: the session holds the
/// `watch::Sender` and is the only writer. The registry reads the latest
/// value when it builds snapshots and never changes it.
#[derive(Debug, Clone)]
pub struct Member {
    session_id: SessionId,
    user_id: UserId,
    user_name: String,
    position: watch::Receiver<Position>,
    outbox: Outbox,
}

impl Member {
    pub fn new(
        session_id: SessionId,
        user_id: UserId,
        user_name: String,
        position: watch::Receiver<Position>,
        outbox: Outbox,
    ) -> Self {
        Self {
            session_id,
            user_id,
            user_name,
            position,
            outbox,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// The session's current position.
    pub fn position(&self) -> Position {
        *self.position.borrow()
    }

    /// How this member appears to everyone else.
    pub fn occupant(&self) -> Occupant {
        let pos = self.position();
        Occupant {
            user_id: self.user_id.clone(),
            user_name: self.user_name.clone(),
            x: pos.x,
            y: pos.y,
        }
    }

    /// Enqueues a message. Returns `false` if the connection is gone.
    pub(crate) fn deliver(&self, msg: ServerMessage) -> bool {
        self.outbox.send(msg).is_ok()
    }
}

//! The per-connection session state machine.
//!
//! A session is the server's record of one connection. It tracks:
//! - WHO is connected (an [`Identity`], once the token checks out)
//! - WHERE they are (a space and a live position)
//! - WHAT state the connection is in
//!
//! ```text
//!   Connecting ──(join)──→ Joining ──(admitted)──→ Active
//!       │                     │                      │
//!       └─────────────────────┴──(fail / disconnect)─┴──→ Closed
//! ```
//!
//! `Closed` is terminal. Every handler runs on the connection's own task,
//! so a session never processes two messages at once.

use plaza_protocol::{MoveTarget, Position, ServerMessage, SessionId, SpaceBounds, SpaceId, UserId};
use plaza_room::{Member, MoveVerdict, Outbox, RoomRegistry, judge_move};
use rand::Rng;
use tokio::sync::watch;

use crate::{Identity, IdentityVerifier, SessionError, SpaceDirectory};

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, has not asked to join yet.
    Connecting,
    /// A join is in flight (token and space lookups, registry admission).
    Joining,
    /// In a space; moves are accepted.
    Active,
    /// Done. Nothing more will be sent on behalf of this session.
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connecting => write!(f, "Connecting"),
            Self::Joining => write!(f, "Joining"),
            Self::Active => write!(f, "Active"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Everything a session knows once it has been placed in a space.
struct Membership {
    space_id: SpaceId,
    identity: Identity,
    bounds: SpaceBounds,
    /// The only writer of this session's position. The registry holds the
    /// matching receiver.
    position: watch::Sender<Position>,
}

/// One connection's view of the world.
///
/// Dropping a session that is still registered in a room schedules the
/// same departure as [`handle_disconnect`](Self::handle_disconnect), so an
/// aborted connection task never leaves a ghost behind.
pub struct Session {
    id: SessionId,
    state: SessionState,
    registry: RoomRegistry,
    outbox: Outbox,
    membership: Option<Membership>,
}

impl Session {
    /// Creates a session in `Connecting`. Everything addressed to this
    /// connection is pushed into `outbox`.
    pub fn new(id: SessionId, registry: RoomRegistry, outbox: Outbox) -> Self {
        Self {
            id,
            state: SessionState::Connecting,
            registry,
            outbox,
            membership: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The space this session is in, if any.
    pub fn space_id(&self) -> Option<&SpaceId> {
        self.membership.as_ref().map(|m| &m.space_id)
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.membership.as_ref().map(|m| &m.identity.user_id)
    }

    /// Current position, if the session is in a space.
    pub fn position(&self) -> Option<Position> {
        self.membership.as_ref().map(|m| *m.position.borrow())
    }

    /// Verifies `token`, looks up `space_id` and enters the space at a
    /// random cell.
    ///
    /// On success the joiner has already been sent `space-joined` and
    /// everyone else `user-joined`. Returns the spawn cell.
    ///
    /// # Errors
    ///
    /// - `AlreadyJoined` if the session is already in (or entering) a space.
    ///   The session is left untouched.
    /// - `NotActive` if the session is closed.
    /// - `AuthFailed`, `SpaceNotFound` or `Room` otherwise. The session is
    ///   now `Closed` and nothing was broadcast.
    pub async fn handle_join<V, D>(
        &mut self,
        verifier: &V,
        spaces: &D,
        token: &str,
        space_id: SpaceId,
    ) -> Result<Position, SessionError>
    where
        V: IdentityVerifier,
        D: SpaceDirectory,
    {
        match self.state {
            SessionState::Connecting => {}
            SessionState::Joining | SessionState::Active => {
                return Err(SessionError::AlreadyJoined);
            }
            SessionState::Closed => return Err(SessionError::NotActive),
        }
        self.state = SessionState::Joining;

        let identity = match verifier.verify(token).await {
            Ok(identity) => identity,
            Err(e) => {
                tracing::warn!(session_id = %self.id, error = %e, "token rejected");
                self.state = SessionState::Closed;
                return Err(e);
            }
        };
        let bounds = match spaces.space_bounds(&space_id).await {
            Ok(bounds) if !bounds.is_empty() => bounds,
            Ok(_) => {
                self.state = SessionState::Closed;
                return Err(SessionError::SpaceNotFound(space_id));
            }
            Err(e) => {
                tracing::info!(session_id = %self.id, %space_id, "unknown space");
                self.state = SessionState::Closed;
                return Err(e);
            }
        };

        let spawn = random_spawn(bounds);
        let user_id = identity.user_id.clone();
        let (position, position_rx) = watch::channel(spawn);
        let member = Member::new(
            self.id,
            identity.user_id.clone(),
            identity.user_name.clone(),
            position_rx,
            self.outbox.clone(),
        );

        // Recorded before the registry is asked, so a task aborted during
        // the join still cleans up on drop.
        self.membership = Some(Membership {
            space_id: space_id.clone(),
            identity,
            bounds,
            position,
        });

        match self.registry.join(&space_id, member).await {
            Ok(others) => {
                self.state = SessionState::Active;
                tracing::info!(
                    session_id = %self.id,
                    %space_id,
                    %user_id,
                    %spawn,
                    others = others.len(),
                    "session joined space"
                );
                Ok(spawn)
            }
            Err(e) => {
                self.membership = None;
                self.state = SessionState::Closed;
                Err(e.into())
            }
        }
    }

    /// Attempts one step to `target`.
    ///
    /// A legal step updates the position, answers `moved` and tells every
    /// other member with `movement`. Anything else answers
    /// `movement-rejected` with the unchanged position.
    ///
    /// # Errors
    ///
    /// `NotActive` if the session is not in a space. Nothing is sent.
    pub async fn handle_move(
        &mut self,
        target: impl Into<MoveTarget>,
    ) -> Result<MoveVerdict, SessionError> {
        if self.state != SessionState::Active {
            return Err(SessionError::NotActive);
        }
        let Some(membership) = &self.membership else {
            return Err(SessionError::NotActive);
        };

        let requested = target.into();
        let current = *membership.position.borrow();
        // A target that names no cell is never one step away.
        let verdict = requested
            .cell()
            .map_or(MoveVerdict::NotAdjacent, |cell| {
                judge_move(current, cell, membership.bounds)
            });
        let Some(target) = requested.cell().filter(|_| verdict.is_accepted()) else {
            tracing::debug!(
                session_id = %self.id,
                %current,
                target = %requested,
                ?verdict,
                "move rejected"
            );
            let _ = self.outbox.send(ServerMessage::MovementRejected(current));
            return Ok(verdict);
        };

        membership.position.send_replace(target);
        let _ = self.outbox.send(ServerMessage::Moved(target));

        let event = ServerMessage::Movement(plaza_protocol::Occupant {
            user_id: membership.identity.user_id.clone(),
            user_name: membership.identity.user_name.clone(),
            x: target.x,
            y: target.y,
        });
        self.registry
            .broadcast(&membership.space_id, event, Some(self.id))
            .await;
        Ok(verdict)
    }

    /// Leaves the space, if in one, telling the remaining members with
    /// `user-left`. Safe to call any number of times; always ends `Closed`.
    pub async fn handle_disconnect(&mut self) {
        if let Some(membership) = self.membership.take() {
            let farewell = ServerMessage::UserLeft {
                user_id: membership.identity.user_id.clone(),
            };
            let removed = self
                .registry
                .depart(&membership.space_id, self.id, Some(farewell))
                .await;
            if removed {
                tracing::info!(
                    session_id = %self.id,
                    space_id = %membership.space_id,
                    user_id = %membership.identity.user_id,
                    "session left space"
                );
            }
        }
        self.state = SessionState::Closed;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let Some(membership) = self.membership.take() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(
                session_id = %self.id,
                "session dropped outside a runtime, membership not released"
            );
            return;
        };

        let registry = self.registry.clone();
        let session_id = self.id;
        runtime.spawn(async move {
            let farewell = ServerMessage::UserLeft {
                user_id: membership.identity.user_id.clone(),
            };
            if registry
                .depart(&membership.space_id, session_id, Some(farewell))
                .await
            {
                tracing::info!(
                    %session_id,
                    space_id = %membership.space_id,
                    "session released on drop"
                );
            }
        });
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("space_id", &self.space_id())
            .finish()
    }
}

/// Picks a uniformly random cell in `[0, width) × [0, height)`.
fn random_spawn(bounds: SpaceBounds) -> Position {
    let mut rng = rand::rng();
    Position::new(
        rng.random_range(0..i64::from(bounds.width)),
        rng.random_range(0..i64::from(bounds.height)),
    )
}

//! Room registry: maps spaces to their room actors.
//!
//! Rooms are created lazily by the first join and disappear when their
//! last member leaves. Different spaces never contend: each room is its
//! own task, and the directory is a sharded [`DashMap`] whose guards are
//! never held across an `.await`.

use std::sync::Arc;

use dashmap::DashMap;
use plaza_protocol::{Occupant, ServerMessage, SessionId, SpaceId};

use crate::room::{Directory, JoinReply, RoomHandle, spawn_room};
use crate::{Member, RoomConfig, RoomError};

/// Tracks the live membership of every space.
///
/// Cheap to clone; clones share the same rooms.
#[derive(Clone)]
pub struct RoomRegistry {
    rooms: Arc<Directory>,
    config: RoomConfig,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::with_config(RoomConfig::default())
    }

    pub fn with_config(config: RoomConfig) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            config,
        }
    }

    /// Adds `member` to `space_id`, creating the room if needed.
    ///
    /// In one step that no other join or leave of the same space can
    /// interleave with, the room:
    ///
    /// 1. takes a snapshot of everyone already present,
    /// 2. sends the joiner `SpaceJoined` with that snapshot,
    /// 3. sends everyone else `UserJoined`,
    /// 4. adds the joiner.
    ///
    /// Returns the snapshot. It never contains the joiner itself.
    pub async fn join(
        &self,
        space_id: &SpaceId,
        member: Member,
    ) -> Result<Vec<Occupant>, RoomError> {
        let session_id = member.session_id();
        for _ in 0..self.config.join_attempts.max(1) {
            let handle = self.room_or_spawn(space_id);
            match handle.join(member.clone()).await {
                JoinReply::Joined(others) => return Ok(others),
                JoinReply::Evicted => {
                    tracing::debug!(
                        %space_id,
                        %session_id,
                        "room closed under join, retrying"
                    );
                    self.forget(space_id, &handle);
                }
            }
        }
        tracing::warn!(%space_id, %session_id, "join gave up");
        Err(RoomError::Unavailable(space_id.clone()))
    }

    /// Removes a session without notifying anyone.
    ///
    /// Returns `true` if it was a member. Unknown spaces and sessions are
    /// no-ops.
    pub async fn leave(&self, space_id: &SpaceId, session_id: SessionId) -> bool {
        self.depart(space_id, session_id, None).await
    }

    /// Removes a session and, if it was present, sends `farewell` to
    /// everyone who remains.
    ///
    /// Removal and farewell happen together: the farewell goes out at most
    /// once no matter how many callers race, and only the caller that
    /// actually removed the session sees `true`.
    pub async fn depart(
        &self,
        space_id: &SpaceId,
        session_id: SessionId,
        farewell: Option<ServerMessage>,
    ) -> bool {
        let Some(handle) = self.room(space_id) else {
            return false;
        };
        handle.leave(session_id, farewell).await
    }

    /// Delivers `event` to every member of the space except `exclude`.
    ///
    /// Per-member delivery failures are swallowed. Broadcasting into a
    /// space with no room is a no-op.
    pub async fn broadcast(
        &self,
        space_id: &SpaceId,
        event: ServerMessage,
        exclude: Option<SessionId>,
    ) {
        if let Some(handle) = self.room(space_id) {
            handle.broadcast(event, exclude).await;
        }
    }

    /// Everyone currently in the space. Never creates a room.
    pub async fn occupants(&self, space_id: &SpaceId) -> Vec<Occupant> {
        match self.room(space_id) {
            Some(handle) => handle.snapshot().await.unwrap_or_default(),
            None => Vec::new(),
        }
    }

    /// Number of spaces that currently have a live room.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn room(&self, space_id: &SpaceId) -> Option<RoomHandle> {
        self.rooms.get(space_id).map(|entry| entry.value().clone())
    }

    fn room_or_spawn(&self, space_id: &SpaceId) -> RoomHandle {
        if let Some(handle) = self.room(space_id) {
            return handle;
        }
        self.rooms
            .entry(space_id.clone())
            .or_insert_with(|| {
                tracing::info!(%space_id, "creating room");
                spawn_room(
                    space_id.clone(),
                    Arc::downgrade(&self.rooms),
                    self.config.command_buffer,
                )
            })
            .value()
            .clone()
    }

    /// Drops the directory entry for a room known to be shut down, unless
    /// it was already replaced.
    fn forget(&self, space_id: &SpaceId, stale: &RoomHandle) {
        self.rooms
            .remove_if(space_id, |_, h| h.generation() == stale.generation());
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RoomRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomRegistry")
            .field("rooms", &self.rooms.len())
            .field("config", &self.config)
            .finish()
    }
}

//! Room actor: one Tokio task per occupied space.
//!
//! Each room owns its member set and is the only thing that touches it.
//! The outside world talks to it through a bounded mpsc channel, and
//! commands that need an answer carry a `oneshot` reply channel. Because
//! the actor handles one command at a time, a join's snapshot and its
//! arrival announcement happen in a single step that no other join or
//! leave can interleave with.
//!
//! When the last member leaves, the actor removes its own entry from the
//! registry's directory, refuses whatever is still queued, and stops.

use std::collections::HashMap;
use std::sync::Weak;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use plaza_protocol::{Occupant, ServerMessage, SessionId, SpaceId};
use tokio::sync::{mpsc, oneshot};

use crate::{Member, RoomError};

/// The registry's space → room table, shared with every actor so an
/// emptied room can take itself out.
pub(crate) type Directory = DashMap<SpaceId, RoomHandle>;

/// Distinguishes successive rooms for the same space.
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Answer to a join request.
#[derive(Debug)]
pub(crate) enum JoinReply {
    /// Admitted. Carries everyone who was already present.
    Joined(Vec<Occupant>),
    /// The room emptied and shut down before this request was handled.
    /// The caller should retry against a fresh room.
    Evicted,
}

pub(crate) enum RoomCommand {
    /// Admit a member: send it `SpaceJoined`, then announce it to the
    /// others with `UserJoined`.
    Join {
        member: Member,
        reply: oneshot::Sender<JoinReply>,
    },

    /// Remove a member. If it was present and `farewell` is set, the
    /// farewell goes to everyone who remains.
    Leave {
        session_id: SessionId,
        farewell: Option<ServerMessage>,
        reply: oneshot::Sender<bool>,
    },

    /// Deliver an event to every member except `exclude`.
    Broadcast {
        event: ServerMessage,
        exclude: Option<SessionId>,
    },

    /// Report everyone currently present.
    Snapshot {
        reply: oneshot::Sender<Vec<Occupant>>,
    },
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Handle to a running room actor. Cheap to clone.
#[derive(Clone)]
pub(crate) struct RoomHandle {
    space_id: SpaceId,
    generation: u64,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Asks the room to admit `member`.
    ///
    /// A closed channel means the room already shut down, which is the
    /// same situation as an explicit `Evicted` reply.
    pub(crate) async fn join(&self, member: Member) -> JoinReply {
        let (reply_tx, reply_rx) = oneshot::channel();
        let cmd = RoomCommand::Join {
            member,
            reply: reply_tx,
        };
        if self.sender.send(cmd).await.is_err() {
            return JoinReply::Evicted;
        }
        reply_rx.await.unwrap_or(JoinReply::Evicted)
    }

    /// Removes a member. Returns `true` only if it was present.
    pub(crate) async fn leave(
        &self,
        session_id: SessionId,
        farewell: Option<ServerMessage>,
    ) -> bool {
        let (reply_tx, reply_rx) = oneshot::channel();
        let cmd = RoomCommand::Leave {
            session_id,
            farewell,
            reply: reply_tx,
        };
        if self.sender.send(cmd).await.is_err() {
            return false;
        }
        reply_rx.await.unwrap_or(false)
    }

    /// Fire-and-forget fan-out.
    pub(crate) async fn broadcast(
        &self,
        event: ServerMessage,
        exclude: Option<SessionId>,
    ) {
        let cmd = RoomCommand::Broadcast { event, exclude };
        if self.sender.send(cmd).await.is_err() {
            tracing::trace!(
                space_id = %self.space_id,
                "broadcast into a room that already shut down"
            );
        }
    }

    pub(crate) async fn snapshot(&self) -> Result<Vec<Occupant>, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Snapshot { reply: reply_tx })
            .await
            .map_err(|_| RoomError::Unavailable(self.space_id.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.space_id.clone()))
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct RoomActor {
    space_id: SpaceId,
    generation: u64,
    members: HashMap<SessionId, Member>,
    directory: Weak<Directory>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    async fn run(mut self) {
        tracing::info!(
            space_id = %self.space_id,
            generation = self.generation,
            "room opened"
        );

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RoomCommand::Join { member, reply } => {
                    let others = self.admit(member);
                    let _ = reply.send(JoinReply::Joined(others));
                }
                RoomCommand::Leave {
                    session_id,
                    farewell,
                    reply,
                } => {
                    let removed = self.remove(session_id, farewell);
                    if removed && self.members.is_empty() {
                        // Leave the directory before answering, so a
                        // caller that sees `true` can rely on the room
                        // being gone.
                        self.evict();
                        let _ = reply.send(removed);
                        break;
                    }
                    let _ = reply.send(removed);
                }
                RoomCommand::Broadcast { event, exclude } => {
                    self.fan_out(&event, exclude);
                }
                RoomCommand::Snapshot { reply } => {
                    let occupants =
                        self.members.values().map(Member::occupant).collect();
                    let _ = reply.send(occupants);
                }
            }
        }

        self.drain().await;
        tracing::info!(space_id = %self.space_id, "room closed");
    }

    /// Adds `member` and returns the occupants it found on arrival.
    fn admit(&mut self, member: Member) -> Vec<Occupant> {
        let session_id = member.session_id();
        let others: Vec<Occupant> = self
            .members
            .values()
            .filter(|m| m.session_id() != session_id)
            .map(Member::occupant)
            .collect();

        let arrival = member.occupant();
        member.deliver(ServerMessage::SpaceJoined {
            spawn: member.position(),
            users: others.clone(),
        });
        self.fan_out(&ServerMessage::UserJoined(arrival), Some(session_id));
        self.members.insert(session_id, member);

        tracing::debug!(
            space_id = %self.space_id,
            %session_id,
            members = self.members.len(),
            "session joined room"
        );
        others
    }

    fn remove(
        &mut self,
        session_id: SessionId,
        farewell: Option<ServerMessage>,
    ) -> bool {
        if self.members.remove(&session_id).is_none() {
            return false;
        }
        if let Some(event) = farewell {
            self.fan_out(&event, None);
        }
        tracing::debug!(
            space_id = %self.space_id,
            %session_id,
            members = self.members.len(),
            "session left room"
        );
        true
    }

    /// Enqueues `event` for every member except `exclude`. A member whose
    /// connection is gone is skipped without affecting the rest.
    fn fan_out(&self, event: &ServerMessage, exclude: Option<SessionId>) {
        for (session_id, member) in &self.members {
            if Some(*session_id) == exclude {
                continue;
            }
            if !member.deliver(event.clone()) {
                tracing::trace!(
                    space_id = %self.space_id,
                    %session_id,
                    "outbox closed, skipping"
                );
            }
        }
    }

    /// Removes this room from the directory, unless the entry has already
    /// been replaced by a newer room.
    fn evict(&self) {
        if let Some(directory) = self.directory.upgrade() {
            directory.remove_if(&self.space_id, |_, handle| {
                handle.generation == self.generation
            });
        }
    }

    /// Refuses everything still queued once the room has emptied.
    async fn drain(&mut self) {
        self.receiver.close();
        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RoomCommand::Join { reply, .. } => {
                    let _ = reply.send(JoinReply::Evicted);
                }
                RoomCommand::Leave { reply, .. } => {
                    let _ = reply.send(false);
                }
                RoomCommand::Snapshot { reply } => {
                    let _ = reply.send(Vec::new());
                }
                RoomCommand::Broadcast { .. } => {}
            }
        }
    }
}

/// Spawns a room actor for `space_id` and returns a handle to it.
///
/// `channel_size` controls backpressure: when the channel fills up,
/// senders wait.
pub(crate) fn spawn_room(
    space_id: SpaceId,
    directory: Weak<Directory>,
    channel_size: usize,
) -> RoomHandle {
    let (sender, receiver) = mpsc::channel(channel_size.max(1));
    let generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);

    let actor = RoomActor {
        space_id: space_id.clone(),
        generation,
        members: HashMap::new(),
        directory,
        receiver,
    };
    tokio::spawn(actor.run());

    RoomHandle {
        space_id,
        generation,
        sender,
    }
}

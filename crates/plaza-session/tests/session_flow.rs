//! Integration tests: sessions driving a real room registry.

use std::time::Duration;

use plaza_protocol::{MoveTarget, Position, ServerMessage, SessionId, SpaceBounds, SpaceId, UserId};
use plaza_room::{MoveVerdict, RoomRegistry};
use plaza_session::{
    Identity, JwtVerifier, Session, SessionError, SessionState, StaticSpaces, StaticVerifier,
};
use tokio::sync::mpsc;

// =========================================================================
// Helpers
// =========================================================================

type Inbox = mpsc::UnboundedReceiver<ServerMessage>;

fn verifier() -> StaticVerifier {
    StaticVerifier::new()
        .with_token("tok-alice", Identity::new("u1", "alice"))
        .with_token("tok-bob", Identity::new("u2", "bob"))
        .with_token("tok-carol", Identity::new("u3", "carol"))
}

/// `corridor` is two cells wide so every spawn has exactly one legal
/// neighbour: the other cell.
fn spaces() -> StaticSpaces {
    StaticSpaces::new()
        .with_space("s1", SpaceBounds::new(100, 200))
        .with_space("corridor", SpaceBounds::new(2, 1))
}

fn session(registry: &RoomRegistry, id: u64) -> (Session, Inbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Session::new(SessionId::new(id), registry.clone(), tx), rx)
}

async fn next(inbox: &mut Inbox) -> ServerMessage {
    tokio::time::timeout(Duration::from_secs(1), inbox.recv())
        .await
        .expect("timed out waiting for a message")
        .expect("outbox closed")
}

fn drain(inbox: &mut Inbox) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = inbox.try_recv() {
        out.push(msg);
    }
    out
}

async fn joined(
    registry: &RoomRegistry,
    id: u64,
    token: &str,
    space: &str,
) -> (Session, Inbox) {
    let (mut s, mut inbox) = session(registry, id);
    s.handle_join(&verifier(), &spaces(), token, SpaceId::from(space))
        .await
        .unwrap();
    assert!(matches!(next(&mut inbox).await, ServerMessage::SpaceJoined { .. }));
    (s, inbox)
}

/// The other cell of the corridor.
fn across(p: Position) -> Position {
    Position::new(1 - p.x, p.y)
}

// =========================================================================
// handle_join
// =========================================================================

#[tokio::test]
async fn test_handle_join_valid_token_enters_space() {
    let registry = RoomRegistry::new();
    let (mut alice, mut inbox) = session(&registry, 1);

    let spawn = alice
        .handle_join(&verifier(), &spaces(), "tok-alice", SpaceId::from("s1"))
        .await
        .unwrap();

    assert_eq!(alice.state(), SessionState::Active);
    assert!(SpaceBounds::new(100, 200).contains(&spawn));
    assert_eq!(alice.position(), Some(spawn));
    assert_eq!(alice.user_id(), Some(&UserId::from("u1")));
    assert_eq!(
        next(&mut inbox).await,
        ServerMessage::SpaceJoined {
            spawn,
            users: vec![],
        }
    );
}

#[tokio::test]
async fn test_handle_join_second_member_learns_about_first() {
    let registry = RoomRegistry::new();
    let (alice, mut alice_inbox) = joined(&registry, 1, "tok-alice", "s1").await;
    let (mut bob, mut bob_inbox) = session(&registry, 2);

    let spawn = bob
        .handle_join(&verifier(), &spaces(), "tok-bob", SpaceId::from("s1"))
        .await
        .unwrap();

    let ServerMessage::SpaceJoined { users, .. } = next(&mut bob_inbox).await else {
        panic!("expected space-joined");
    };
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].user_id, UserId::from("u1"));
    assert_eq!(Some(users[0].position()), alice.position());

    let ServerMessage::UserJoined(arrival) = next(&mut alice_inbox).await else {
        panic!("expected user-joined");
    };
    assert_eq!(arrival.user_id, UserId::from("u2"));
    assert_eq!(arrival.user_name, "bob");
    assert_eq!(arrival.position(), spawn);
}

#[tokio::test]
async fn test_handle_join_invalid_token_closes_without_broadcast() {
    let registry = RoomRegistry::new();
    let (_alice, mut alice_inbox) = joined(&registry, 1, "tok-alice", "s1").await;
    let (mut mallory, mut mallory_inbox) = session(&registry, 9);

    let err = mallory
        .handle_join(&verifier(), &spaces(), "forged", SpaceId::from("s1"))
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::AuthFailed(_)));
    assert!(err.is_fatal());
    assert_eq!(mallory.state(), SessionState::Closed);
    assert!(drain(&mut mallory_inbox).is_empty());
    assert_eq!(registry.occupants(&SpaceId::from("s1")).await.len(), 1);
    assert!(drain(&mut alice_inbox).is_empty());
}

#[tokio::test]
async fn test_handle_join_jwt_verifier() {
    let registry = RoomRegistry::new();
    let jwt = JwtVerifier::new("secret");
    let token = jwt.issue(&Identity::new("u7", "gus"), None);
    let (mut s, mut inbox) = session(&registry, 1);

    s.handle_join(&jwt, &spaces(), &token, SpaceId::from("s1"))
        .await
        .unwrap();

    assert_eq!(s.user_id(), Some(&UserId::from("u7")));
    assert!(matches!(next(&mut inbox).await, ServerMessage::SpaceJoined { .. }));
}

#[tokio::test]
async fn test_handle_join_unknown_space_closes() {
    let registry = RoomRegistry::new();
    let (mut alice, mut inbox) = session(&registry, 1);

    let err = alice
        .handle_join(&verifier(), &spaces(), "tok-alice", SpaceId::from("nope"))
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::SpaceNotFound(_)));
    assert_eq!(alice.state(), SessionState::Closed);
    assert_eq!(registry.room_count(), 0);
    assert!(drain(&mut inbox).is_empty());
}

#[tokio::test]
async fn test_handle_join_twice_rejected_and_stays_in_room() {
    let registry = RoomRegistry::new();
    let (mut alice, mut inbox) = joined(&registry, 1, "tok-alice", "s1").await;

    let err = alice
        .handle_join(&verifier(), &spaces(), "tok-alice", SpaceId::from("corridor"))
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::AlreadyJoined));
    assert!(!err.is_fatal());
    assert_eq!(alice.state(), SessionState::Active);
    assert_eq!(alice.space_id(), Some(&SpaceId::from("s1")));
    assert_eq!(registry.room_count(), 1);
    assert!(drain(&mut inbox).is_empty());
}

#[tokio::test]
async fn test_handle_join_same_identity_twice_gives_two_members() {
    let registry = RoomRegistry::new();
    let (_first, _i1) = joined(&registry, 1, "tok-alice", "s1").await;
    let (_second, _i2) = joined(&registry, 2, "tok-alice", "s1").await;

    assert_eq!(registry.occupants(&SpaceId::from("s1")).await.len(), 2);
}

// =========================================================================
// handle_move
// =========================================================================

#[tokio::test]
async fn test_handle_move_before_join_is_not_active() {
    let registry = RoomRegistry::new();
    let (mut s, mut inbox) = session(&registry, 1);

    let err = s.handle_move(Position::new(1, 0)).await.unwrap_err();

    assert!(matches!(err, SessionError::NotActive));
    assert!(drain(&mut inbox).is_empty());
}

#[tokio::test]
async fn test_handle_move_legal_acks_and_broadcasts() {
    let registry = RoomRegistry::new();
    let (mut alice, mut alice_inbox) = joined(&registry, 1, "tok-alice", "corridor").await;
    let (_bob, mut bob_inbox) = joined(&registry, 2, "tok-bob", "corridor").await;
    drain(&mut alice_inbox);

    let target = across(alice.position().unwrap());
    let verdict = alice.handle_move(target).await.unwrap();

    assert_eq!(verdict, MoveVerdict::Accepted);
    assert_eq!(alice.position(), Some(target));
    assert_eq!(next(&mut alice_inbox).await, ServerMessage::Moved(target));
    let ServerMessage::Movement(moved) = next(&mut bob_inbox).await else {
        panic!("expected movement");
    };
    assert_eq!(moved.user_id, UserId::from("u1"));
    assert_eq!(moved.user_name, "alice");
    assert_eq!(moved.position(), target);
    assert!(drain(&mut alice_inbox).is_empty(), "mover saw its own broadcast");
}

#[tokio::test]
async fn test_handle_move_two_cells_rejected_with_current_position() {
    let registry = RoomRegistry::new();
    let (mut alice, mut alice_inbox) = joined(&registry, 1, "tok-alice", "s1").await;
    let (_bob, mut bob_inbox) = joined(&registry, 2, "tok-bob", "s1").await;
    drain(&mut alice_inbox);

    let start = alice.position().unwrap();
    let verdict = alice
        .handle_move(Position::new(start.x + 2, start.y))
        .await
        .unwrap();

    assert_eq!(verdict, MoveVerdict::NotAdjacent);
    assert_eq!(alice.position(), Some(start));
    assert_eq!(
        next(&mut alice_inbox).await,
        ServerMessage::MovementRejected(start)
    );
    registry.occupants(&SpaceId::from("s1")).await;
    assert!(drain(&mut bob_inbox).is_empty());
}

#[tokio::test]
async fn test_handle_move_off_grid_rejected() {
    let registry = RoomRegistry::new();
    let (mut alice, mut inbox) = joined(&registry, 1, "tok-alice", "corridor").await;
    let start = alice.position().unwrap();

    let verdict = alice.handle_move(Position::new(start.x, 1)).await.unwrap();

    assert_eq!(verdict, MoveVerdict::OutOfBounds);
    assert_eq!(next(&mut inbox).await, ServerMessage::MovementRejected(start));
}

#[tokio::test]
async fn test_handle_move_to_non_cell_rejected_with_current_position() {
    let registry = RoomRegistry::new();
    let (mut alice, mut inbox) = joined(&registry, 1, "tok-alice", "corridor").await;
    let start = alice.position().unwrap();

    for target in [
        MoveTarget::new(start.x as f64 + 0.5, 0.0),
        MoveTarget::new(1e20, 0.0),
    ] {
        let verdict = alice.handle_move(target).await.unwrap();
        assert_eq!(verdict, MoveVerdict::NotAdjacent, "{target}");
        assert_eq!(next(&mut inbox).await, ServerMessage::MovementRejected(start));
    }
    assert_eq!(alice.position(), Some(start));

    let other = Position::new(1 - start.x, 0);
    let verdict = alice
        .handle_move(MoveTarget::new(other.x as f64, 0.0))
        .await
        .unwrap();
    assert_eq!(verdict, MoveVerdict::Accepted);
    assert_eq!(next(&mut inbox).await, ServerMessage::Moved(other));
}

#[tokio::test]
async fn test_handle_move_updates_snapshot_for_later_joiners() {
    let registry = RoomRegistry::new();
    let (mut alice, _alice_inbox) = joined(&registry, 1, "tok-alice", "corridor").await;
    let target = across(alice.position().unwrap());
    alice.handle_move(target).await.unwrap();

    let (mut bob, mut bob_inbox) = session(&registry, 2);
    bob.handle_join(&verifier(), &spaces(), "tok-bob", SpaceId::from("corridor"))
        .await
        .unwrap();

    let ServerMessage::SpaceJoined { users, .. } = next(&mut bob_inbox).await else {
        panic!("expected space-joined");
    };
    assert_eq!(users[0].position(), target);
}

// =========================================================================
// handle_disconnect
// =========================================================================

#[tokio::test]
async fn test_handle_disconnect_broadcasts_user_left_once() {
    let registry = RoomRegistry::new();
    let (mut alice, _alice_inbox) = joined(&registry, 1, "tok-alice", "s1").await;
    let (_bob, mut bob_inbox) = joined(&registry, 2, "tok-bob", "s1").await;

    alice.handle_disconnect().await;
    alice.handle_disconnect().await;

    assert_eq!(alice.state(), SessionState::Closed);
    assert_eq!(
        next(&mut bob_inbox).await,
        ServerMessage::UserLeft {
            user_id: UserId::from("u1"),
        }
    );
    registry.occupants(&SpaceId::from("s1")).await;
    assert!(drain(&mut bob_inbox).is_empty());
}

#[tokio::test]
async fn test_handle_disconnect_last_member_evicts_room() {
    let registry = RoomRegistry::new();
    let (mut alice, _inbox) = joined(&registry, 1, "tok-alice", "s1").await;

    alice.handle_disconnect().await;

    assert_eq!(registry.room_count(), 0);
}

#[tokio::test]
async fn test_handle_disconnect_before_join_is_noop() {
    let registry = RoomRegistry::new();
    let (mut s, _inbox) = session(&registry, 1);

    s.handle_disconnect().await;

    assert_eq!(s.state(), SessionState::Closed);
    let err = s.handle_move(Position::new(0, 0)).await.unwrap_err();
    assert!(matches!(err, SessionError::NotActive));
}

#[tokio::test]
async fn test_drop_active_session_releases_membership() {
    let registry = RoomRegistry::new();
    let (alice, _alice_inbox) = joined(&registry, 1, "tok-alice", "s1").await;
    let (_bob, mut bob_inbox) = joined(&registry, 2, "tok-bob", "s1").await;

    drop(alice);

    assert_eq!(
        next(&mut bob_inbox).await,
        ServerMessage::UserLeft {
            user_id: UserId::from("u1"),
        }
    );
    assert_eq!(registry.occupants(&SpaceId::from("s1")).await.len(), 1);
}

#[tokio::test]
async fn test_drop_after_disconnect_sends_nothing_more() {
    let registry = RoomRegistry::new();
    let (mut alice, _alice_inbox) = joined(&registry, 1, "tok-alice", "s1").await;
    let (_bob, mut bob_inbox) = joined(&registry, 2, "tok-bob", "s1").await;

    alice.handle_disconnect().await;
    drop(alice);
    tokio::task::yield_now().await;

    assert!(matches!(next(&mut bob_inbox).await, ServerMessage::UserLeft { .. }));
    registry.occupants(&SpaceId::from("s1")).await;
    assert!(drain(&mut bob_inbox).is_empty());
}

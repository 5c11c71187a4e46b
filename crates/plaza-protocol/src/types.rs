//! Core protocol types for Plaza's wire format.
//!
//! Every frame on the wire is a JSON object of the shape
//! `{ "type": "<kebab-case-name>", "payload": { ... } }`. Clients send
//! [`ClientMessage`]s, the server answers and fans out
//! [`ServerMessage`]s.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifies one live connection on the server.
///
/// Generated at accept time and never derived from the user's identity;
/// a single user may hold several sessions at once. Never sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

/// Counter for generating unique session IDs.
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

impl SessionId {
    /// Allocates a fresh, process-unique session id.
    pub fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Wraps a raw value. Mostly useful in tests.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sess-{}", self.0)
    }
}

/// The identity id issued by the account service (e.g. a database key).
///
/// `#[serde(transparent)]` keeps it a plain JSON string on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifies a space (a room on the wire).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpaceId(pub String);

impl fmt::Display for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SpaceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for SpaceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// An integer grid coordinate.
///
/// Signed so that any integer a client sends decodes and is then rejected
/// by the movement rule, rather than failing to decode.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

impl Position {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// `|dx| + |dy|`, computed without overflow.
    pub fn manhattan_distance(&self, other: &Position) -> u64 {
        self.x.abs_diff(other.x).saturating_add(self.y.abs_diff(other.y))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// The cell a client asks to step onto, exactly as sent.
///
/// Clients speak JSON numbers, so `6.0`, `6.5` and `1e20` all decode.
/// Only coordinates that name an actual cell reach the movement rule;
/// see [`MoveTarget::cell`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveTarget {
    pub x: f64,
    pub y: f64,
}

impl MoveTarget {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// The grid cell this target names, or `None` when a coordinate is
    /// fractional or outside the `i64` range.
    pub fn cell(&self) -> Option<Position> {
        Some(Position::new(whole(self.x)?, whole(self.y)?))
    }
}

fn whole(v: f64) -> Option<i64> {
    // `i64::MAX as f64` rounds up to 2^63, hence the exclusive bound.
    let in_range = v >= i64::MIN as f64 && v < i64::MAX as f64;
    (in_range && v.fract() == 0.0).then_some(v as i64)
}

impl From<Position> for MoveTarget {
    fn from(pos: Position) -> Self {
        Self::new(pos.x as f64, pos.y as f64)
    }
}

impl fmt::Display for MoveTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Width and height of a space's grid. Valid cells are
/// `[0, width) × [0, height)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceBounds {
    pub width: u32,
    pub height: u32,
}

impl SpaceBounds {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns `true` if `pos` lies inside the grid.
    pub fn contains(&self, pos: &Position) -> bool {
        (0..i64::from(self.width)).contains(&pos.x)
            && (0..i64::from(self.height)).contains(&pos.y)
    }

    /// A grid with no cells cannot host anyone.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for SpaceBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Parses the account service's `"WIDTHxHEIGHT"` dimension strings,
/// e.g. `"100x200"`.
impl FromStr for SpaceBounds {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProtocolError::InvalidDimensions(s.to_owned());
        let (w, h) = s.trim().split_once('x').ok_or_else(invalid)?;
        let width: u32 = w.trim().parse().map_err(|_| invalid())?;
        let height: u32 = h.trim().parse().map_err(|_| invalid())?;
        let bounds = Self { width, height };
        if bounds.is_empty() {
            return Err(invalid());
        }
        Ok(bounds)
    }
}

// ---------------------------------------------------------------------------
// Occupant: one entry of a room snapshot
// ---------------------------------------------------------------------------

/// Another user present in a space, as seen by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Occupant {
    pub user_id: UserId,
    pub user_name: String,
    pub x: i64,
    pub y: i64,
}

impl Occupant {
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Messages a client sends to the server.
///
/// Adjacently tagged: `{ "type": "move", "payload": { "x": 6, "y": 5 } }`.
/// Unknown payload fields are ignored; an unknown `type` fails to decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Enter a space. `token` is the bearer token issued at sign-in.
    Join {
        token: String,
        #[serde(rename = "spaceId")]
        space_id: SpaceId,
    },

    /// Step to a neighbouring cell.
    Move(MoveTarget),
}

/// Messages the server sends to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// To the joiner: where it spawned and who else is already here.
    SpaceJoined {
        spawn: Position,
        users: Vec<Occupant>,
    },

    /// To everyone else in the space: somebody arrived.
    UserJoined(Occupant),

    /// To the mover: the move was accepted.
    Moved(Position),

    /// To the mover: the move was refused; carries the unchanged position
    /// so the client can undo any optimistic movement.
    MovementRejected(Position),

    /// To everyone else in the space: somebody moved.
    Movement(Occupant),

    /// To everyone else in the space: somebody left.
    UserLeft {
        #[serde(rename = "userId")]
        user_id: UserId,
    },

    /// To one client: its last frame could not be processed.
    /// `code` follows HTTP conventions (400 malformed, 409 conflict).
    Error { code: u16, message: String },
}

// =========================================================================
// Tests
// =========================================================================

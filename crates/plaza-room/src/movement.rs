//! The movement rule: one orthogonal step, inside the grid.
//!
//! This is the complete collision model. Other occupants and placed
//! elements are deliberately not consulted, so two users may share a cell.

use plaza_protocol::{Position, SpaceBounds};

/// Outcome of checking a proposed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveVerdict {
    /// Exactly one orthogonal step, landing inside the grid.
    Accepted,
    /// The displacement is fine but the target is outside the grid.
    OutOfBounds,
    /// Diagonal, multi-cell, or zero-length displacement.
    NotAdjacent,
}

impl MoveVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Classifies the step from `current` to `target`.
///
/// Adjacency is checked first, so a far-away out-of-bounds target reports
/// `NotAdjacent`.
pub fn judge_move(
    current: Position,
    target: Position,
    bounds: SpaceBounds,
) -> MoveVerdict {
    if current.manhattan_distance(&target) != 1 {
        return MoveVerdict::NotAdjacent;
    }
    if !bounds.contains(&target) {
        return MoveVerdict::OutOfBounds;
    }
    MoveVerdict::Accepted
}

/// Returns `true` iff the step from `current` to `target` is legal.
pub fn is_legal_move(
    current: Position,
    target: Position,
    bounds: SpaceBounds,
) -> bool {
    judge_move(current, target, bounds).is_accepted()
}

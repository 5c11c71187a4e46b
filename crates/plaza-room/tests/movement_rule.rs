//! Property tests for the movement rule.
//!
//! A step is legal exactly when it moves one cell along one axis and
//! lands inside the grid.

use plaza_protocol::{Position, SpaceBounds};
use plaza_room::{MoveVerdict, is_legal_move, judge_move};
use proptest::prelude::*;

fn bounds_strategy() -> impl Strategy<Value = SpaceBounds> {
    (1u32..500, 1u32..500).prop_map(|(w, h)| SpaceBounds::new(w, h))
}

fn cell_in(bounds: SpaceBounds) -> impl Strategy<Value = Position> {
    (0..i64::from(bounds.width), 0..i64::from(bounds.height))
        .prop_map(|(x, y)| Position::new(x, y))
}

fn unit_step() -> impl Strategy<Value = (i64, i64)> {
    prop_oneof![Just((1, 0)), Just((-1, 0)), Just((0, 1)), Just((0, -1))]
}

proptest! {
    /// Legality matches the arithmetic definition for arbitrary targets.
    #[test]
    fn prop_legal_iff_unit_step_in_bounds(
        bounds in bounds_strategy(),
        cx in -10i64..510,
        cy in -10i64..510,
        tx in -10i64..510,
        ty in -10i64..510,
    ) {
        let current = Position::new(cx, cy);
        let target = Position::new(tx, ty);
        let expected = (cx - tx).abs() + (cy - ty).abs() == 1
            && (0..i64::from(bounds.width)).contains(&tx)
            && (0..i64::from(bounds.height)).contains(&ty);

        prop_assert_eq!(is_legal_move(current, target, bounds), expected);
    }

    /// From any in-bounds cell, a unit step is either accepted or
    /// refused only because it leaves the grid.
    #[test]
    fn prop_unit_step_never_not_adjacent(
        (bounds, current) in bounds_strategy()
            .prop_flat_map(|b| (Just(b), cell_in(b))),
        (dx, dy) in unit_step(),
    ) {
        let target = Position::new(current.x + dx, current.y + dy);
        let verdict = judge_move(current, target, bounds);

        if bounds.contains(&target) {
            prop_assert_eq!(verdict, MoveVerdict::Accepted);
        } else {
            prop_assert_eq!(verdict, MoveVerdict::OutOfBounds);
        }
    }

    /// Any move of two or more cells is refused, wherever it lands.
    #[test]
    fn prop_long_moves_rejected(
        bounds in bounds_strategy(),
        cx in any::<i32>(),
        cy in any::<i32>(),
        dx in any::<i32>(),
        dy in any::<i32>(),
    ) {
        let current = Position::new(i64::from(cx), i64::from(cy));
        let target = Position::new(
            i64::from(cx) + i64::from(dx),
            i64::from(cy) + i64::from(dy),
        );
        prop_assume!(i64::from(dx).abs() + i64::from(dy).abs() != 1);

        prop_assert_eq!(judge_move(current, target, bounds), MoveVerdict::NotAdjacent);
    }
}

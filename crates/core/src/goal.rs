//! Goals handed to the external planner.
//!
//! A goal is an in-goal predicate plus a distance heuristic over the
//! agent's feet position. All goal kinds are variants of one [`Goal`] enum
//! evaluated by a single dispatcher, so composite semantics are defined in
//! exactly one place.

use serde::{Deserialize, Serialize};

use crate::coord::Coord;

/// Heuristic cost of walking one block on flat ground.
pub const COST_PER_HORIZONTAL_BLOCK: f64 = 3.563;
/// Heuristic cost of climbing one block.
pub const COST_PER_BLOCK_UP: f64 = 5.0;
/// Heuristic cost of dropping one block.
pub const COST_PER_BLOCK_DOWN: f64 = 1.8;
/// Lower targets are preferred by this much per unit of height.
pub const HEIGHT_PRIORITY: f64 = 100.0;

/// How a planner should treat the goal it is handed this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalMode {
    /// Set the goal and path to it, keeping any compatible in-flight path.
    SetAndPath,
    /// Drop the current path and hold position with this goal set.
    CancelAndSet,
    /// Re-check the current path against the new goal before continuing.
    ForceRevalidate,
    /// Stop and wait for an operator.
    RequestPause,
}

/// How a composite combines its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeMode {
    /// Satisfied by any child; heuristic is the smallest child heuristic.
    Any,
    /// Satisfied when every child is; heuristic is the largest child heuristic.
    All,
    /// Satisfied by any child; heuristic comes from the first child only.
    PrimaryFirst,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Goal {
    /// Stand exactly at this feet position.
    Block { at: Coord },
    /// Stand inside or face-adjacent to the cell, including with the head
    /// level with it.
    GetToBlock { at: Coord },
    /// Be within reach to mine `target`, but never above it.
    Break { target: Coord },
    /// Stand on the cell above `target` to place downward into it.
    Place { target: Coord },
    /// Be next to `target` to place into it against a neighbour, without
    /// standing in `target` or in the `excluded` support cell.
    Adjacent {
        target: Coord,
        excluded: Coord,
        allow_same_level: bool,
    },
    /// Get near the cell above `target` without going higher than it or
    /// standing in it.
    Overhead { target: Coord },
    Composite {
        children: Vec<Goal>,
        mode: CompositeMode,
    },
}

impl Goal {
    /// OR-combination of `children`.
    pub fn any(children: Vec<Goal>) -> Self {
        Goal::Composite {
            children,
            mode: CompositeMode::Any,
        }
    }

    /// `primary` or `fallback`, with the heuristic taken from `primary`.
    pub fn with_fallback(primary: Goal, fallback: Goal) -> Self {
        Goal::Composite {
            children: vec![primary, fallback],
            mode: CompositeMode::PrimaryFirst,
        }
    }

    pub fn is_in_goal(&self, feet: Coord) -> bool {
        match self {
            Goal::Block { at } => feet == *at,
            Goal::GetToBlock { at } => get_to_block_in_goal(*at, feet),
            Goal::Break { target } => feet.y <= target.y && get_to_block_in_goal(*target, feet),
            Goal::Place { target } => feet == target.above(),
            Goal::Adjacent {
                target,
                excluded,
                allow_same_level,
            } => {
                if feet == *target || feet == *excluded {
                    return false;
                }
                if !allow_same_level && feet.y == target.y - 1 {
                    return false;
                }
                if feet.y < target.y - 1 {
                    return false;
                }
                get_to_block_in_goal(*target, feet)
            }
            Goal::Overhead { target } => {
                let above = target.above();
                if feet.y > above.y || feet == above {
                    return false;
                }
                get_to_block_in_goal(above, feet)
            }
            Goal::Composite { children, mode } => match mode {
                CompositeMode::Any | CompositeMode::PrimaryFirst => {
                    children.iter().any(|g| g.is_in_goal(feet))
                }
                CompositeMode::All => {
                    !children.is_empty() && children.iter().all(|g| g.is_in_goal(feet))
                }
            },
        }
    }

    pub fn heuristic(&self, feet: Coord) -> f64 {
        match self {
            Goal::Block { at } => block_heuristic(*at - feet),
            Goal::GetToBlock { at } | Goal::Break { target: at } => {
                get_to_block_heuristic(*at, feet)
            }
            Goal::Overhead { target } => get_to_block_heuristic(target.above(), feet),
            Goal::Place { target } => {
                let stand = target.above();
                f64::from(stand.y) * HEIGHT_PRIORITY + block_heuristic(stand - feet)
            }
            Goal::Adjacent { target, .. } => {
                f64::from(target.y) * HEIGHT_PRIORITY + get_to_block_heuristic(*target, feet)
            }
            Goal::Composite { children, mode } => match mode {
                CompositeMode::Any => children
                    .iter()
                    .map(|g| g.heuristic(feet))
                    .fold(f64::INFINITY, f64::min),
                CompositeMode::All => children
                    .iter()
                    .map(|g| g.heuristic(feet))
                    .fold(f64::NEG_INFINITY, f64::max)
                    .max(0.0),
                CompositeMode::PrimaryFirst => children
                    .first()
                    .map_or(f64::INFINITY, |g| g.heuristic(feet)),
            },
        }
    }

    /// Number of leaf goals.
    pub fn leaf_count(&self) -> usize {
        match self {
            Goal::Composite { children, .. } => children.iter().map(Goal::leaf_count).sum(),
            _ => 1,
        }
    }
}

fn get_to_block_in_goal(at: Coord, feet: Coord) -> bool {
    let d = feet - at;
    // Feet one below the cell still counts: the head is level with it.
    let dy = if d.y < 0 { d.y + 1 } else { d.y };
    d.x.abs() + dy.abs() + d.z.abs() <= 1
}

fn get_to_block_heuristic(at: Coord, feet: Coord) -> f64 {
    let mut d = at - feet;
    if d.y > 1 {
        d.y -= 1;
    }
    block_heuristic(d)
}

/// Heuristic for a displacement from feet to goal.
fn block_heuristic(d: Coord) -> f64 {
    xz_heuristic(d.x, d.z) + y_heuristic(d.y)
}

fn xz_heuristic(dx: i32, dz: i32) -> f64 {
    let x = f64::from(dx.abs());
    let z = f64::from(dz.abs());
    let diagonal = x.min(z);
    let straight = (x - z).abs();
    (diagonal * std::f64::consts::SQRT_2 + straight) * COST_PER_HORIZONTAL_BLOCK
}

fn y_heuristic(dy: i32) -> f64 {
    if dy > 0 {
        f64::from(dy) * COST_PER_BLOCK_UP
    } else {
        f64::from(-dy) * COST_PER_BLOCK_DOWN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_goal_is_exact() {
        let g = Goal::Block { at: Coord::new(1, 2, 3) };
        assert!(g.is_in_goal(Coord::new(1, 2, 3)));
        assert!(!g.is_in_goal(Coord::new(1, 3, 3)));
        assert_eq!(g.heuristic(Coord::new(1, 2, 3)), 0.0);
        assert!(g.heuristic(Coord::new(5, 2, 3)) > g.heuristic(Coord::new(2, 2, 3)));
    }

    #[test]
    fn get_to_block_accepts_neighbours_and_head_level() {
        let g = Goal::GetToBlock { at: Coord::new(0, 5, 0) };
        assert!(g.is_in_goal(Coord::new(0, 5, 0)));
        assert!(g.is_in_goal(Coord::new(1, 5, 0)));
        assert!(g.is_in_goal(Coord::new(0, 6, 0)));
        assert!(g.is_in_goal(Coord::new(0, 4, 0)));
        assert!(g.is_in_goal(Coord::new(1, 4, 0)));
        assert!(!g.is_in_goal(Coord::new(1, 6, 0)));
        assert!(!g.is_in_goal(Coord::new(2, 5, 0)));
    }

    #[test]
    fn break_goal_excludes_standing_on_top() {
        let g = Goal::Break { target: Coord::new(0, 5, 0) };
        assert!(!g.is_in_goal(Coord::new(0, 6, 0)));
        assert!(g.is_in_goal(Coord::new(1, 5, 0)));
        assert!(g.is_in_goal(Coord::new(0, 4, 0)));
    }

    #[test]
    fn place_goal_stands_above_and_prefers_low_targets() {
        let low = Goal::Place { target: Coord::new(0, 1, 0) };
        let high = Goal::Place { target: Coord::new(0, 5, 0) };
        assert!(low.is_in_goal(Coord::new(0, 2, 0)));
        assert!(!low.is_in_goal(Coord::new(0, 1, 0)));
        let feet = Coord::new(3, 1, 3);
        assert!(low.heuristic(feet) < high.heuristic(feet));
    }

    #[test]
    fn adjacent_goal_rules() {
        let target = Coord::new(0, 10, 0);
        let g = Goal::Adjacent {
            target,
            excluded: target.relative(crate::coord::Face::North),
            allow_same_level: false,
        };
        assert!(!g.is_in_goal(target));
        assert!(!g.is_in_goal(Coord::new(0, 10, -1)));
        assert!(g.is_in_goal(Coord::new(1, 10, 0)));
        assert!(g.is_in_goal(Coord::new(0, 11, 0)));
        // Head level is disallowed unless same-level placement is allowed.
        assert!(!g.is_in_goal(Coord::new(1, 9, 0)));
        let same_level = Goal::Adjacent {
            target,
            excluded: target.below(),
            allow_same_level: true,
        };
        assert!(same_level.is_in_goal(Coord::new(1, 9, 0)));
        assert!(!same_level.is_in_goal(Coord::new(0, 8, 0)));
    }

    #[test]
    fn overhead_goal_stays_at_or_below_the_cell_above() {
        let g = Goal::Overhead { target: Coord::new(0, 5, 0) };
        assert!(!g.is_in_goal(Coord::new(0, 6, 0)));
        assert!(!g.is_in_goal(Coord::new(0, 7, 0)));
        assert!(g.is_in_goal(Coord::new(1, 6, 0)));
    }

    #[test]
    fn any_composite_takes_min_heuristic() {
        let near = Goal::Block { at: Coord::new(1, 0, 0) };
        let far = Goal::Block { at: Coord::new(10, 0, 0) };
        let g = Goal::any(vec![far.clone(), near.clone()]);
        let feet = Coord::ZERO;
        assert_eq!(g.heuristic(feet), near.heuristic(feet));
        assert!(g.is_in_goal(Coord::new(10, 0, 0)));
        assert_eq!(g.leaf_count(), 2);
    }

    #[test]
    fn empty_any_composite_is_unsatisfiable() {
        let g = Goal::any(vec![]);
        assert!(!g.is_in_goal(Coord::ZERO));
        assert!(g.heuristic(Coord::ZERO).is_infinite());
    }

    #[test]
    fn all_composite_needs_every_child() {
        let g = Goal::Composite {
            children: vec![
                Goal::GetToBlock { at: Coord::ZERO },
                Goal::GetToBlock { at: Coord::new(1, 0, 0) },
            ],
            mode: CompositeMode::All,
        };
        assert!(g.is_in_goal(Coord::new(1, 0, 0)));
        assert!(!g.is_in_goal(Coord::new(2, 0, 0)));
    }

    #[test]
    fn fallback_composite_uses_primary_heuristic_only() {
        let primary = Goal::Block { at: Coord::new(20, 0, 0) };
        let fallback = Goal::Block { at: Coord::new(1, 0, 0) };
        let g = Goal::with_fallback(primary.clone(), fallback);
        let feet = Coord::ZERO;
        assert_eq!(g.heuristic(feet), primary.heuristic(feet));
        // ...while either child satisfies it.
        assert!(g.is_in_goal(Coord::new(1, 0, 0)));
    }

    #[test]
    fn goals_serialize_with_kind_tag() {
        let g = Goal::Break { target: Coord::new(1, 2, 3) };
        let json = serde_json::to_string(&g).unwrap();
        assert!(json.contains("\"kind\":\"break\""));
    }
}

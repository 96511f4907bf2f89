//! Immediate interactions within reach of the agent.
//!
//! Before handing a goal to the planner the controller looks for a block it
//! can break or place right now, from where the agent already stands.

use voxelwright_core::{AgentStatus, BlockState, Coord, Face};

use crate::reconcile::ScanContext;
use crate::validity::is_valid;

/// Highest level above the feet searched for placements.
const PLACE_MAX_DY: i32 = 3;

/// A placement the agent can perform this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub target: Coord,
    /// The solid neighbour clicked against.
    pub against: Coord,
    /// Face of `against` that is clicked.
    pub face: Face,
    /// Priority slot holding the item.
    pub slot: usize,
    /// What the item places.
    pub state: BlockState,
}

/// A wrong, solid block within reach that is safe to mine now.
///
/// The block directly under the feet is never returned.
pub fn find_break(ctx: &ScanContext<'_>, agent: &AgentStatus) -> Option<Coord> {
    let planner = &ctx.config.planner;
    let radius = planner.nearby_radius;
    let min_dy = if planner.break_below_feet { -1 } else { 0 };
    let feet = agent.feet;

    for dx in -radius..=radius {
        for dy in min_dy..=radius {
            for dz in -radius..=radius {
                if dy == -1 && dx == 0 && dz == 0 {
                    continue;
                }
                let at = feet.offset(dx, dy, dz);
                let current = ctx.world.get(at);
                let Some(desired) = ctx.desired_at(at, &current) else {
                    continue;
                };
                if ctx.retry.is_exhausted(at) {
                    continue;
                }
                if current.is_air()
                    || current.is_liquid()
                    || is_valid(&ctx.config.validity, &current, Some(&desired), false)
                {
                    continue;
                }
                if agent.within_reach(at, planner.reach_distance) {
                    return Some(at);
                }
            }
        }
    }
    None
}

/// A wrong, replaceable cell within reach that a priority-slot item can
/// fill now. Every desired state seen along the way is pushed onto
/// `desirable` so the caller can stage inventory for it.
pub fn find_placement(
    ctx: &ScanContext<'_>,
    agent: &AgentStatus,
    slots: &[Option<BlockState>],
    priority: usize,
    desirable: &mut Vec<BlockState>,
) -> Option<Placement> {
    let radius = ctx.config.planner.nearby_radius;
    let feet = agent.feet;

    for dx in -radius..=radius {
        for dy in -radius..=PLACE_MAX_DY {
            for dz in -radius..=radius {
                let at = feet.offset(dx, dy, dz);
                let current = ctx.world.get(at);
                let Some(desired) = ctx.desired_at(at, &current) else {
                    continue;
                };
                if !current.is_replaceable()
                    || is_valid(&ctx.config.validity, &current, Some(&desired), false)
                {
                    continue;
                }
                // Would have to place at head height into open air.
                if dy == 1 && ctx.world.get(at.above()).is_air() {
                    continue;
                }
                let placement = possible_to_place(ctx, agent, &desired, at, slots, priority);
                desirable.push(desired);
                if placement.is_some() {
                    return placement;
                }
            }
        }
    }
    None
}

/// Placing `state` at `at` would not trap the agent.
pub fn placement_plausible(agent: &AgentStatus, at: Coord, state: &BlockState) -> bool {
    !state.has_collision() || !agent.occupies(at)
}

fn possible_to_place(
    ctx: &ScanContext<'_>,
    agent: &AgentStatus,
    desired: &BlockState,
    at: Coord,
    slots: &[Option<BlockState>],
    priority: usize,
) -> Option<Placement> {
    if !placement_plausible(agent, at, desired) {
        return None;
    }
    let (slot, state) = slots
        .iter()
        .take(priority)
        .enumerate()
        .find_map(|(slot, held)| {
            held.as_ref()
                .filter(|held| is_valid(&ctx.config.validity, held, Some(desired), true))
                .map(|held| (slot, held.clone()))
        })?;

    Face::ALL.into_iter().find_map(|face| {
        let against = at.relative(face);
        let solid = !ctx.world.get(against).is_replaceable();
        (solid && agent.within_reach(against, ctx.config.planner.reach_distance)).then(|| {
            Placement {
                target: at,
                against,
                face: face.opposite(),
                slot,
                state: state.clone(),
            }
        })
    })
}

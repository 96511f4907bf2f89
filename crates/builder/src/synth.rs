//! Turning the incorrect set into a goal for the planner.
//!
//! Incorrect cells are sorted into buckets by what is there now:
//!
//! - empty cells whose material is held become placement targets,
//! - solid cells become break targets,
//! - source liquids are displaced by standing on them (placing scaffolding),
//! - flowing liquids and materials not held are only reported.
//!
//! Break goals and place goals are each OR-combined. When both exist the
//! placement composite is primary and supplies the heuristic.

use std::collections::{BTreeMap, HashSet};

use voxelwright_core::{AgentStatus, BlockState, Coord, Face, Goal};

use crate::nearby::placement_plausible;
use crate::reconcile::ScanContext;

/// Everything one synthesis pass produced.
#[derive(Debug, Clone, Default)]
pub struct Synthesis {
    pub goal: Option<Goal>,
    /// Empty cells whose desired material is held, lowest first.
    pub placeable: Vec<Coord>,
    pub breakable: Vec<Coord>,
    pub source_liquids: Vec<Coord>,
    pub flowing_liquids: Vec<Coord>,
    /// Desired material name → number of cells wanting it but not held.
    pub missing: BTreeMap<String, usize>,
    /// Placement targets with no adjacent geometry; the caller notes these
    /// with the retry limiter.
    pub fallback_places: Vec<Coord>,
    pub place_goals: usize,
    pub break_goals: usize,
}

pub struct GoalSynthesizer<'a> {
    ctx: ScanContext<'a>,
    agent: &'a AgentStatus,
}

impl<'a> GoalSynthesizer<'a> {
    pub fn new(ctx: ScanContext<'a>, agent: &'a AgentStatus) -> Self {
        Self { ctx, agent }
    }

    /// Classify `incorrect` against `placeable` and build the tick goal.
    ///
    /// With `log_missing`, missing materials and unreplaceable liquids are
    /// logged when no goal can be produced.
    pub fn assemble(
        &self,
        incorrect: &HashSet<Coord>,
        placeable: &[BlockState],
        log_missing: bool,
    ) -> Synthesis {
        let mut out = Synthesis::default();

        let mut positions: Vec<Coord> = incorrect.iter().copied().collect();
        positions.sort_by_key(|c| (c.y, c.x, c.z));

        for at in positions {
            let current = self.ctx.world.get(at);
            if current.is_air() {
                let Some(desired) = self.ctx.desired_at(at, &current) else {
                    continue;
                };
                if placeable.iter().any(|held| held.same_block(&desired)) {
                    // Upper halves appear when the base is placed.
                    if desired.is_base_part() {
                        out.placeable.push(at);
                    }
                } else {
                    *out.missing.entry(desired.name().to_string()).or_default() += 1;
                }
            } else if current.is_liquid() {
                if current.is_source_liquid() {
                    out.source_liquids.push(at);
                } else {
                    out.flowing_liquids.push(at);
                }
            } else if !self.ctx.retry.is_exhausted(at) {
                out.breakable.push(at);
            }
        }

        let to_break: Vec<Goal> = out.breakable.iter().map(|at| self.break_goal(*at)).collect();

        let pending: HashSet<Coord> = out.placeable.iter().copied().collect();
        let mut to_place = Vec::new();
        for at in &out.placeable {
            // Lower cells of a pillar first.
            if pending.contains(&at.below()) || pending.contains(&at.below_n(2)) {
                continue;
            }
            to_place.push(self.placement_goal(*at, &mut out.fallback_places));
        }
        to_place.extend(out.source_liquids.iter().map(|at| Goal::Block { at: at.above() }));

        out.place_goals = to_place.len();
        out.break_goals = to_break.len();

        out.goal = if !to_place.is_empty() {
            Some(Goal::with_fallback(Goal::any(to_place), Goal::any(to_break)))
        } else if !to_break.is_empty() {
            Some(Goal::any(to_break))
        } else {
            if log_missing {
                self.log_unresolvable(&out);
            }
            None
        };
        out
    }

    /// "Be in reach, not on top." With break-from-above allowed and two
    /// free cells overhead, standing on the block is offered as a fallback.
    pub fn break_goal(&self, at: Coord) -> Goal {
        let world = self.ctx.world;
        if self.ctx.config.planner.break_from_above_allowed
            && world.get(at.above()).is_air()
            && world.get(at.above_n(2)).is_air()
        {
            return Goal::with_fallback(Goal::Break { target: at }, Goal::Overhead { target: at });
        }
        Goal::Break { target: at }
    }

    /// Prefer standing beside `at` and placing against a solid neighbour;
    /// otherwise stand on top and place downward.
    pub fn placement_goal(&self, at: Coord, fallbacks: &mut Vec<Coord>) -> Goal {
        let world = self.ctx.world;
        let current = world.get(at);
        if !current.is_air() {
            return Goal::Place { target: at };
        }
        let allow_same_level = !world.get(at.above()).is_air();
        let plausible = self
            .ctx
            .desired_at(at, &current)
            .is_some_and(|desired| placement_plausible(self.agent, at, &desired));

        if plausible {
            for face in Face::HORIZONTALS_AND_DOWN {
                let against = at.relative(face);
                if world.get(against).has_collision() {
                    return Goal::Adjacent {
                        target: at,
                        excluded: against,
                        allow_same_level,
                    };
                }
            }
        }
        fallbacks.push(at);
        Goal::Place { target: at }
    }

    fn log_unresolvable(&self, out: &Synthesis) {
        if !out.missing.is_empty() {
            let summary = out
                .missing
                .iter()
                .map(|(block, count)| format!("{count}x {block}"))
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(missing = %summary, "Missing materials");
        }
        if !out.flowing_liquids.is_empty() {
            let cells = out
                .flowing_liquids
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(cells = %cells, "Unreplaceable liquids");
        }
    }
}

//! Placement and break costs consulted by the planner.
//!
//! A [`CostContext`] is built once per tick from owned snapshots so the
//! planner can search on another thread while the session keeps ticking.

use voxelwright_config::BuildConfig;
use voxelwright_core::{BlockState, Coord};

use crate::validity::is_valid;
use crate::view::SchematicView;

/// Cost used for "never do this".
pub const COST_INF: f64 = 1_000_000.0;

#[derive(Debug, Clone)]
pub struct CostContext {
    view: SchematicView,
    /// States the agent can place without rummaging.
    hotbar: Vec<BlockState>,
    has_throwaway: bool,
    config: BuildConfig,
}

impl CostContext {
    pub fn new(
        view: SchematicView,
        hotbar: Vec<BlockState>,
        has_throwaway: bool,
        config: &BuildConfig,
    ) -> Self {
        Self {
            view,
            hotbar,
            has_throwaway,
            config: config.clone(),
        }
    }

    fn relevant_desired(&self, at: Coord, current: &BlockState) -> Option<BlockState> {
        self.view.desired_at(at, current).filter(|desired| {
            !self
                .config
                .validity
                .skip_materials
                .iter()
                .any(|name| name == desired.name())
        })
    }

    /// Cost of placing a block at `at` while pathing.
    ///
    /// Placing exactly what the pattern wants from the hotbar is free;
    /// scaffolding inside the pattern is penalised more than outside it.
    pub fn place_cost(&self, at: Coord, current: &BlockState) -> f64 {
        if !self.config.planner.allow_place {
            return COST_INF;
        }
        let penalty = self.config.planner.block_place_penalty;
        match self.relevant_desired(at, current) {
            Some(desired) => {
                if desired.is_air() {
                    // It will have to be broken again later.
                    return penalty * 2.0;
                }
                if self
                    .hotbar
                    .iter()
                    .any(|held| is_valid(&self.config.validity, held, Some(&desired), true))
                {
                    return 0.0;
                }
                if !self.has_throwaway {
                    return COST_INF;
                }
                penalty * 3.0
            }
            None if self.has_throwaway => penalty,
            None => COST_INF,
        }
    }

    /// Multiplier applied to the planner's break time at `at`.
    pub fn break_multiplier(&self, at: Coord, current: &BlockState) -> f64 {
        if !self.config.planner.allow_break {
            return COST_INF;
        }
        match self.relevant_desired(at, current) {
            Some(desired) if desired.is_air() => 1.0,
            Some(desired) if is_valid(&self.config.validity, current, Some(&desired), false) => {
                self.config.planner.break_correct_block_penalty
            }
            _ => 1.0,
        }
    }

    pub fn has_throwaway(&self) -> bool {
        self.has_throwaway
    }
}

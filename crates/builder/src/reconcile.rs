//! Tracking which cells of the schematic are wrong.
//!
//! A full scan walks the whole volume and is only run when the incorrect
//! set is missing or has just drained; every other tick a cube around the
//! agent is rescanned. Cells out of observation range are assumed wrong
//! unless they were last seen correct.

use std::collections::HashSet;

use serde::Serialize;
use voxelwright_config::BuildConfig;
use voxelwright_core::{BlockOracle, BlockState, Coord, Region};

use crate::retry::RetryLimiter;
use crate::validity::is_valid;
use crate::view::SchematicView;

/// Everything a scan reads. Borrowed for the duration of one tick.
#[derive(Clone, Copy)]
pub struct ScanContext<'a> {
    pub view: &'a SchematicView,
    pub world: &'a dyn BlockOracle,
    pub retry: &'a RetryLimiter,
    pub config: &'a BuildConfig,
}

impl<'a> ScanContext<'a> {
    pub fn new(
        view: &'a SchematicView,
        world: &'a dyn BlockOracle,
        retry: &'a RetryLimiter,
        config: &'a BuildConfig,
    ) -> Self {
        Self {
            view,
            world,
            retry,
            config,
        }
    }

    /// Desired state at `at` given what is there now.
    pub fn desired_at(&self, at: Coord, current: &BlockState) -> Option<BlockState> {
        self.view.desired_at(at, current)
    }

    /// Correct under the non-strict predicate, or given up on.
    pub fn is_settled(&self, at: Coord, current: &BlockState, desired: &BlockState) -> bool {
        is_valid(&self.config.validity, current, Some(desired), false)
            || self.retry.is_exhausted(at)
    }

    pub fn is_skipped(&self, desired: &BlockState) -> bool {
        self.config
            .validity
            .skip_materials
            .iter()
            .any(|name| name == desired.name())
    }
}

/// Outcome of one full scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub examined: usize,
    pub incorrect: usize,
    /// The ceiling was hit and the scan stopped early.
    pub aborted: bool,
}

/// The incorrect-position set plus the memory of cells last seen correct.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationEngine {
    /// `None` until the first full scan, and after invalidation.
    incorrect: Option<HashSet<Coord>>,
    observed_completed: HashSet<Coord>,
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incorrect(&self) -> Option<&HashSet<Coord>> {
        self.incorrect.as_ref()
    }

    pub fn incorrect_count(&self) -> usize {
        self.incorrect.as_ref().map_or(0, HashSet::len)
    }

    pub fn is_incorrect(&self, at: Coord) -> bool {
        self.incorrect.as_ref().is_some_and(|set| set.contains(&at))
    }

    pub fn observed_completed(&self) -> &HashSet<Coord> {
        &self.observed_completed
    }

    /// Force the next refresh to start with a full scan.
    pub fn invalidate(&mut self) {
        self.incorrect = None;
    }

    /// Forget everything, including cells last seen correct.
    pub fn reset(&mut self) {
        self.incorrect = None;
        self.observed_completed.clear();
    }

    /// Rebuild the incorrect set from the whole schematic volume.
    pub fn full_scan(&mut self, ctx: &ScanContext<'_>) -> ScanSummary {
        let origin = ctx.view.origin();
        let schematic = ctx.view.schematic();
        let ceiling = ctx.config.max_incorrect_before_abort;
        let mut incorrect = HashSet::new();
        let mut examined = 0;
        let mut aborted = false;

        for rel in ctx.view.extent().iter() {
            let at = origin + rel;
            let current = ctx.world.get(at);
            if !schematic.in_domain(rel, &current) {
                continue;
            }
            examined += 1;
            let desired = schematic.desired(rel, &current, ctx.view.placeable());

            if ctx.world.is_observed(at) {
                if ctx.is_settled(at, &current, &desired) {
                    self.observed_completed.insert(at);
                    continue;
                }
                self.observed_completed.remove(&at);
                incorrect.insert(at);
            } else if !self.observed_completed.contains(&at) && !ctx.is_skipped(&desired) {
                incorrect.insert(at);
            } else {
                continue;
            }

            if incorrect.len() > ceiling {
                aborted = true;
                break;
            }
        }

        let summary = ScanSummary {
            examined,
            incorrect: incorrect.len(),
            aborted,
        };
        if aborted {
            tracing::debug!(ceiling, "Full scan stopped at the incorrect-cell ceiling");
        }
        tracing::debug!(
            examined = summary.examined,
            incorrect = summary.incorrect,
            "Full scan"
        );
        self.incorrect = Some(incorrect);
        summary
    }

    /// Re-examine the cube of `radius` around `center`. Unobserved cells
    /// keep whatever status they had.
    pub fn local_rescan(&mut self, ctx: &ScanContext<'_>, center: Coord, radius: i32) {
        let Some(bounds) = ctx.view.bounds() else {
            return;
        };
        let incorrect = self.incorrect.get_or_insert_with(HashSet::new);
        for at in Region::around(center, radius).iter() {
            if !bounds.contains(at) {
                continue;
            }
            let current = ctx.world.get(at);
            let Some(desired) = ctx.desired_at(at, &current) else {
                incorrect.remove(&at);
                continue;
            };
            if !ctx.world.is_observed(at) {
                continue;
            }
            if ctx.is_settled(at, &current, &desired) {
                incorrect.remove(&at);
                self.observed_completed.insert(at);
            } else {
                incorrect.insert(at);
                self.observed_completed.remove(&at);
            }
        }
    }

    /// One tick's worth of reconciliation. Returns whether anything is
    /// still incorrect.
    ///
    /// A local pass alone cannot prove the whole volume is done, so an
    /// empty result is always confirmed by a full scan.
    pub fn refresh(&mut self, ctx: &ScanContext<'_>, feet: Coord) -> bool {
        if self.incorrect.is_none() {
            let summary = self.full_scan(ctx);
            if summary.incorrect == 0 {
                return false;
            }
        }
        self.local_rescan(ctx, feet, ctx.config.tick_scan_radius);
        if self.incorrect_count() == 0 {
            self.full_scan(ctx);
        }
        self.incorrect_count() > 0
    }
}

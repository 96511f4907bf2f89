//! The desired pattern being built, and its decorators.
//!
//! A [`Schematic`] is a function from (relative coordinate, current state)
//! to an optional desired state, with fixed bounds. Decorators wrap an
//! inner [`SchematicRef`] and never mutate it, so the same underlying
//! pattern can be windowed, substituted and restricted at once.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::block::BlockState;
use crate::coord::{Coord, Extent, Region};
use crate::error::SchematicError;

/// A desired-block-per-coordinate pattern with explicit bounds.
///
/// Implementations must be safe to share with a planner thread: the cost
/// model holds an `Arc` to the active schematic.
pub trait Schematic: Send + Sync + fmt::Debug {
    /// Bounding box size.
    fn extent(&self) -> Extent;

    /// Whether `rel` is governed by the pattern at all.
    fn in_domain(&self, rel: Coord, current: &BlockState) -> bool {
        let _ = current;
        self.extent().contains(rel)
    }

    /// The state wanted at `rel`. `placeable` is an approximation of what
    /// the agent can currently place, for patterns that adapt to it.
    fn desired(&self, rel: Coord, current: &BlockState, placeable: &[BlockState]) -> BlockState;

    /// Forget any per-build state (called between repeats).
    fn reset(&self) {}
}

/// Shared handle to a schematic.
pub type SchematicRef = Arc<dyn Schematic>;

/// Something that can produce a schematic on request (a file, a clipboard,
/// another mod's open projection). Parsing formats is the source's concern.
pub trait SchematicSource {
    /// A user-facing label for the build.
    fn name(&self) -> &str;

    fn load(&self) -> Result<SchematicRef, SchematicError>;
}

// ── Fill ──────────────────────────────────────────────────────────────────

/// Every cell in the box wants the same state.
#[derive(Debug, Clone)]
pub struct FillSchematic {
    extent: Extent,
    state: BlockState,
}

impl FillSchematic {
    pub fn new(extent: Extent, state: BlockState) -> Self {
        Self { extent, state }
    }
}

impl Schematic for FillSchematic {
    fn extent(&self) -> Extent {
        self.extent
    }

    fn desired(&self, _rel: Coord, _current: &BlockState, _placeable: &[BlockState]) -> BlockState {
        self.state.clone()
    }
}

// ── Grid ──────────────────────────────────────────────────────────────────

/// An explicit cell map. Cells without an entry take `fill`, or are outside
/// the domain when there is no fill.
#[derive(Debug, Clone, Default)]
pub struct GridSchematic {
    extent: Extent,
    cells: HashMap<Coord, BlockState>,
    fill: Option<BlockState>,
}

impl GridSchematic {
    pub fn new(extent: Extent) -> Self {
        Self {
            extent,
            cells: HashMap::new(),
            fill: None,
        }
    }

    /// Give every unset cell a desired state (usually air).
    pub fn with_fill(mut self, fill: BlockState) -> Self {
        self.fill = Some(fill);
        self
    }

    /// Set one cell. Cells outside the extent are ignored.
    pub fn with_cell(mut self, rel: Coord, state: BlockState) -> Self {
        self.set(rel, state);
        self
    }

    pub fn set(&mut self, rel: Coord, state: BlockState) {
        if self.extent.contains(rel) {
            self.cells.insert(rel, state);
        } else {
            tracing::debug!(rel = %rel, extent = %self.extent, "Ignoring cell outside schematic");
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl Schematic for GridSchematic {
    fn extent(&self) -> Extent {
        self.extent
    }

    fn in_domain(&self, rel: Coord, _current: &BlockState) -> bool {
        self.extent.contains(rel) && (self.fill.is_some() || self.cells.contains_key(&rel))
    }

    fn desired(&self, rel: Coord, _current: &BlockState, _placeable: &[BlockState]) -> BlockState {
        self.cells
            .get(&rel)
            .or(self.fill.as_ref())
            .cloned()
            .unwrap_or_else(BlockState::air)
    }
}

// ── Layer window ──────────────────────────────────────────────────────────

/// Restricts an inner schematic to a vertical slice `[min_y, max_y]`.
#[derive(Debug, Clone)]
pub struct LayerWindow {
    inner: SchematicRef,
    min_y: i32,
    max_y: i32,
}

impl LayerWindow {
    pub fn new(inner: SchematicRef, min_y: i32, max_y: i32) -> Self {
        Self {
            inner,
            min_y,
            max_y,
        }
    }

    /// The window for `layer` layers of `layer_height` each. Layer 0 is
    /// empty; once `layer * layer_height` reaches the height the window
    /// covers everything. Top-down order grows the window from the top.
    pub fn for_layer(inner: SchematicRef, layer: i32, layer_height: i32, top_down: bool) -> Self {
        let height = inner.extent().height;
        let (min_y, max_y) = if top_down {
            (height - layer * layer_height, height - 1)
        } else {
            (0, layer * layer_height - 1)
        };
        Self::new(inner, min_y, max_y)
    }

    pub fn bounds(&self) -> (i32, i32) {
        (self.min_y, self.max_y)
    }
}

impl Schematic for LayerWindow {
    fn extent(&self) -> Extent {
        self.inner.extent()
    }

    fn in_domain(&self, rel: Coord, current: &BlockState) -> bool {
        self.inner.extent().contains(rel)
            && rel.y >= self.min_y
            && rel.y <= self.max_y
            && self.inner.in_domain(rel, current)
    }

    fn desired(&self, rel: Coord, current: &BlockState, placeable: &[BlockState]) -> BlockState {
        self.inner.desired(rel, current, placeable)
    }

    fn reset(&self) {
        self.inner.reset();
    }
}

// ── Substitution ──────────────────────────────────────────────────────────

/// Swaps desired materials for alternatives the agent can actually place.
///
/// For a desired material with alternatives: keep the current block if it
/// is already one of them (except air), otherwise take the first
/// alternative that is placeable, otherwise the first alternative.
/// Properties of the desired state carry over.
#[derive(Debug, Clone)]
pub struct SubstituteSchematic {
    inner: SchematicRef,
    substitutes: BTreeMap<String, Vec<String>>,
}

impl SubstituteSchematic {
    pub fn new(inner: SchematicRef, substitutes: BTreeMap<String, Vec<String>>) -> Self {
        Self { inner, substitutes }
    }
}

impl Schematic for SubstituteSchematic {
    fn extent(&self) -> Extent {
        self.inner.extent()
    }

    fn in_domain(&self, rel: Coord, current: &BlockState) -> bool {
        self.inner.in_domain(rel, current)
    }

    fn desired(&self, rel: Coord, current: &BlockState, placeable: &[BlockState]) -> BlockState {
        let desired = self.inner.desired(rel, current, placeable);
        let Some(alternatives) = self.substitutes.get(desired.name()) else {
            return desired;
        };
        if !current.is_air() && alternatives.iter().any(|alt| alt == current.name()) {
            return desired.with_block(current.name());
        }
        for alt in alternatives {
            if BlockState::new(alt.as_str()).is_air() {
                return if current.is_air() {
                    current.clone()
                } else {
                    BlockState::air()
                };
            }
            if placeable.iter().any(|p| p.name() == alt) {
                return desired.with_block(alt.as_str());
            }
        }
        match alternatives.first() {
            Some(first) => BlockState::new(first.as_str()),
            None => desired,
        }
    }

    fn reset(&self) {
        self.inner.reset();
    }
}

// ── Selection ─────────────────────────────────────────────────────────────

/// Only cells whose world position falls inside one of `regions` count.
#[derive(Debug, Clone)]
pub struct SelectionSchematic {
    inner: SchematicRef,
    origin: Coord,
    regions: Vec<Region>,
}

impl SelectionSchematic {
    pub fn new(inner: SchematicRef, origin: Coord, regions: Vec<Region>) -> Self {
        Self {
            inner,
            origin,
            regions,
        }
    }
}

impl Schematic for SelectionSchematic {
    fn extent(&self) -> Extent {
        self.inner.extent()
    }

    fn in_domain(&self, rel: Coord, current: &BlockState) -> bool {
        let world = self.origin + rel;
        self.inner.in_domain(rel, current) && self.regions.iter().any(|r| r.contains(world))
    }

    fn desired(&self, rel: Coord, current: &BlockState, placeable: &[BlockState]) -> BlockState {
        self.inner.desired(rel, current, placeable)
    }

    fn reset(&self) {
        self.inner.reset();
    }
}

//! Read access to the live block grid.

use std::collections::HashMap;

use crate::block::BlockState;
use crate::coord::{Coord, Region};

/// Block identity at a coordinate plus whether that area is currently
/// observed (loaded / within view). Unobserved reads are best-effort.
pub trait BlockOracle {
    fn get(&self, at: Coord) -> BlockState;

    fn is_observed(&self, at: Coord) -> bool;
}

impl<T: BlockOracle + ?Sized> BlockOracle for &T {
    fn get(&self, at: Coord) -> BlockState {
        (**self).get(at)
    }

    fn is_observed(&self, at: Coord) -> bool {
        (**self).is_observed(at)
    }
}

/// A sparse grid where every unset cell is air. Used by the simulator and
/// by tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWorld {
    blocks: HashMap<Coord, BlockState>,
    /// `None` means everything is observed.
    observed: Option<Region>,
}

impl InMemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit observation to `region`; reads elsewhere still return data.
    pub fn with_observed(mut self, region: Region) -> Self {
        self.observed = Some(region);
        self
    }

    pub fn set_observed(&mut self, region: Option<Region>) {
        self.observed = region;
    }

    pub fn set(&mut self, at: Coord, state: BlockState) {
        if state.is_air() {
            self.blocks.remove(&at);
        } else {
            self.blocks.insert(at, state);
        }
    }

    pub fn fill(&mut self, region: Region, state: &BlockState) {
        for at in region.iter() {
            self.set(at, state.clone());
        }
    }

    /// Number of non-air cells.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl BlockOracle for InMemoryWorld {
    fn get(&self, at: Coord) -> BlockState {
        self.blocks.get(&at).cloned().unwrap_or_else(BlockState::air)
    }

    fn is_observed(&self, at: Coord) -> bool {
        self.observed.is_none_or(|region| region.contains(at))
    }
}

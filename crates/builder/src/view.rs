//! A schematic pinned to a world origin.

use voxelwright_core::{BlockState, Coord, Extent, Region, SchematicRef};

/// The active schematic (already windowed/decorated), where it sits in the
/// world, and the placeable hint handed to adaptive schematics.
///
/// Cheap to clone: the schematic is shared.
#[derive(Debug, Clone)]
pub struct SchematicView {
    schematic: SchematicRef,
    origin: Coord,
    placeable: Vec<BlockState>,
}

impl SchematicView {
    pub fn new(schematic: SchematicRef, origin: Coord, placeable: Vec<BlockState>) -> Self {
        Self {
            schematic,
            origin,
            placeable,
        }
    }

    pub fn schematic(&self) -> &SchematicRef {
        &self.schematic
    }

    pub fn origin(&self) -> Coord {
        self.origin
    }

    pub fn extent(&self) -> Extent {
        self.schematic.extent()
    }

    pub fn placeable(&self) -> &[BlockState] {
        &self.placeable
    }

    /// The world-space bounding box. `None` for an empty extent.
    pub fn bounds(&self) -> Option<Region> {
        let extent = self.extent();
        extent.is_buildable().then(|| {
            Region::spanning(
                self.origin,
                self.origin
                    .offset(extent.width - 1, extent.height - 1, extent.length - 1),
            )
        })
    }

    /// Desired state at world position `at`, or `None` if the schematic
    /// does not govern it.
    pub fn desired_at(&self, at: Coord, current: &BlockState) -> Option<BlockState> {
        let rel = at - self.origin;
        if !self.schematic.extent().contains(rel) || !self.schematic.in_domain(rel, current) {
            return None;
        }
        Some(self.schematic.desired(rel, current, &self.placeable))
    }
}

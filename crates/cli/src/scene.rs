//! Scene files for `voxelwright simulate`.
//!
//! A scene describes the starting world, what the agent carries and the
//! pattern to build. The pattern is drawn as ASCII: one entry per layer
//! (bottom first), each a list of rows along z, one character per x.
//! A space leaves the cell ungoverned.
//!
//! ```toml
//! name = "hut"
//! origin = [2, 64, 0]
//! agent = [0, 64, 0]
//!
//! [[world]]
//! from = [-8, 63, -8]
//! to = [8, 63, 8]
//! block = "dirt"
//!
//! [[inventory]]
//! slot = 0
//! block = "stone"
//! count = 64
//!
//! [schematic]
//! palette = { "#" = "stone", "." = "air" }
//! layers = [["###", "#.#", "###"]]
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use voxelwright_core::error::SchematicError;
use voxelwright_core::schematic::GridSchematic;
use voxelwright_core::{
    AgentStatus, BlockState, Coord, Extent, InMemoryWorld, Region, SchematicRef,
    SchematicSource, SlotInventory,
};

#[derive(Debug, Clone, Deserialize)]
pub struct Scene {
    pub name: String,
    pub origin: Coord,
    #[serde(default = "default_agent")]
    pub agent: Coord,
    #[serde(default)]
    pub max_ticks: Option<u32>,
    #[serde(default)]
    pub world: Vec<WorldFill>,
    #[serde(default)]
    pub inventory: Vec<InventoryStack>,
    pub schematic: PatternSpec,
}

fn default_agent() -> Coord {
    Coord::new(0, 64, 0)
}

/// A box of one block state. `to` defaults to `from`.
#[derive(Debug, Clone, Deserialize)]
pub struct WorldFill {
    pub from: Coord,
    #[serde(default)]
    pub to: Option<Coord>,
    pub block: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InventoryStack {
    pub slot: usize,
    pub block: String,
    #[serde(default = "default_count")]
    pub count: u32,
}

fn default_count() -> u32 {
    64
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatternSpec {
    pub palette: BTreeMap<String, String>,
    pub layers: Vec<Vec<String>>,
}

impl Scene {
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read scene {}: {e}", path.display()))?;
        Self::from_toml(&content)
            .map_err(|e| format!("Invalid scene {}: {e}", path.display()).into())
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn build_world(&self) -> Result<InMemoryWorld, String> {
        let mut world = InMemoryWorld::new();
        for fill in &self.world {
            let state: BlockState = fill.block.parse()?;
            let region = Region::spanning(fill.from, fill.to.unwrap_or(fill.from));
            world.fill(region, &state);
        }
        Ok(world)
    }

    pub fn build_inventory(&self) -> Result<SlotInventory, String> {
        let mut inventory = SlotInventory::standard();
        for stack in &self.inventory {
            let state: BlockState = stack.block.parse()?;
            inventory.put(stack.slot, state, stack.count);
        }
        Ok(inventory)
    }

    pub fn agent(&self) -> AgentStatus {
        AgentStatus::idle_at(self.agent)
    }
}

impl SchematicSource for Scene {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> Result<SchematicRef, SchematicError> {
        let grid = self.schematic.to_grid(&self.name)?;
        Ok(Arc::new(grid))
    }
}

impl PatternSpec {
    fn to_grid(&self, name: &str) -> Result<GridSchematic, SchematicError> {
        let parse_error = |reason: String| SchematicError::Parse {
            name: name.to_string(),
            reason,
        };

        let mut palette = BTreeMap::new();
        for (key, block) in &self.palette {
            let mut chars = key.chars();
            let (Some(symbol), None) = (chars.next(), chars.next()) else {
                return Err(parse_error(format!("palette key '{key}' is not one character")));
            };
            let state: BlockState = block.parse().map_err(parse_error)?;
            palette.insert(symbol, state);
        }

        let height = self.layers.len();
        let length = self.layers.first().map_or(0, Vec::len);
        let width = self
            .layers
            .iter()
            .flatten()
            .map(|row| row.chars().count())
            .max()
            .unwrap_or(0);
        let extent = Extent::new(to_i32(width)?, to_i32(height)?, to_i32(length)?);
        if !extent.is_buildable() {
            return Err(SchematicError::InvalidExtent {
                width: extent.width,
                height: extent.height,
                length: extent.length,
            });
        }

        let mut grid = GridSchematic::new(extent);
        for (y, layer) in self.layers.iter().enumerate() {
            if layer.len() != length {
                return Err(parse_error(format!(
                    "layer {y} has {} rows, expected {length}",
                    layer.len()
                )));
            }
            for (z, row) in layer.iter().enumerate() {
                for (x, symbol) in row.chars().enumerate() {
                    if symbol == ' ' {
                        continue;
                    }
                    let state = palette.get(&symbol).ok_or_else(|| {
                        parse_error(format!(
                            "'{symbol}' at layer {y}, row {z} is not in the palette"
                        ))
                    })?;
                    grid.set(
                        Coord::new(to_i32(x)?, to_i32(y)?, to_i32(z)?),
                        state.clone(),
                    );
                }
            }
        }
        Ok(grid)
    }
}

fn to_i32(n: usize) -> Result<i32, SchematicError> {
    i32::try_from(n).map_err(|_| SchematicError::InvalidExtent {
        width: i32::MAX,
        height: i32::MAX,
        length: i32::MAX,
    })
}

//! Block identity and state.
//!
//! A [`BlockState`] is an opaque material name plus an immutable property
//! map. Equality is structural. The engine never needs a full block
//! registry: the handful of structural families it reasons about are
//! recognised from the material name by [`BlockFamily::of`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Properties that only describe how a block is rotated or attached.
pub const ORIENTATION_PROPERTIES: &[&str] = &[
    "axis", "facing", "half", "shape", "north", "east", "south", "west", "up", "open",
];

const AIR: &str = "air";

/// Structural families the reconciler treats specially.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockFamily {
    /// Nothing there.
    Air,
    /// Water or lava, source or flowing.
    Liquid,
    /// Non-colliding filler that placement simply overwrites (grass, snow).
    Replaceable,
    Slab,
    Door,
    Chest,
    /// Fences, panes, walls and bars whose connection state follows neighbours.
    Cross,
    /// Everything else.
    Solid,
}

impl BlockFamily {
    /// Classify a material name.
    pub fn of(name: &str) -> Self {
        let name = name.rsplit(':').next().unwrap_or(name);
        match name {
            "air" | "cave_air" | "void_air" => Self::Air,
            "water" | "lava" => Self::Liquid,
            "short_grass" | "grass" | "tall_grass" | "fern" | "large_fern" | "dead_bush"
            | "snow" | "vine" => Self::Replaceable,
            "iron_bars" => Self::Cross,
            "chest" | "trapped_chest" => Self::Chest,
            _ if name.ends_with("_slab") => Self::Slab,
            _ if name.ends_with("_door") && !name.ends_with("trapdoor") => Self::Door,
            _ if name.ends_with("_fence") || name.ends_with("_pane") || name.ends_with("_wall") => {
                Self::Cross
            }
            _ => Self::Solid,
        }
    }
}

/// A block identity plus its property map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockState {
    name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    properties: BTreeMap<String, String>,
}

impl BlockState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn air() -> Self {
        Self::new(AIR)
    }

    /// Builder-style property setter.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn family(&self) -> BlockFamily {
        BlockFamily::of(&self.name)
    }

    pub fn is_air(&self) -> bool {
        self.family() == BlockFamily::Air
    }

    pub fn is_liquid(&self) -> bool {
        self.family() == BlockFamily::Liquid
    }

    /// A still liquid block (level 0). Flowing liquid cannot be displaced reliably.
    pub fn is_source_liquid(&self) -> bool {
        self.is_liquid() && self.property("level").is_none_or(|level| level == "0")
    }

    /// Placement overwrites this cell without breaking it first.
    pub fn is_replaceable(&self) -> bool {
        matches!(
            self.family(),
            BlockFamily::Air | BlockFamily::Liquid | BlockFamily::Replaceable
        )
    }

    /// Occupies volume that an agent cannot share.
    pub fn has_collision(&self) -> bool {
        !self.is_replaceable()
    }

    /// The same material with every property stripped.
    pub fn default_state(&self) -> BlockState {
        BlockState::new(self.name.clone())
    }

    /// A different material carrying over this state's properties.
    pub fn with_block(&self, name: impl Into<String>) -> BlockState {
        BlockState {
            name: name.into(),
            properties: self.properties.clone(),
        }
    }

    pub fn same_block(&self, other: &BlockState) -> bool {
        self.name == other.name
    }

    /// Whether this state is the part a player actually places (the lower
    /// half of a door, the foot of a bed). Upper parts appear on their own.
    pub fn is_base_part(&self) -> bool {
        !(self.property("part") == Some("head") || self.property("half") == Some("upper"))
    }

    /// Same material, and every property that differs is an orientation one.
    pub fn same_without_orientation(&self, other: &BlockState) -> bool {
        if !self.same_block(other) {
            return false;
        }
        self.properties
            .iter()
            .filter(|(key, _)| !ORIENTATION_PROPERTIES.contains(&key.as_str()))
            .all(|(key, value)| other.properties.get(key) == Some(value))
            && other
                .properties
                .iter()
                .filter(|(key, _)| !ORIENTATION_PROPERTIES.contains(&key.as_str()))
                .all(|(key, value)| self.properties.get(key) == Some(value))
    }
}

impl Default for BlockState {
    fn default() -> Self {
        Self::air()
    }
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.properties.is_empty() {
            let props: Vec<String> = self
                .properties
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            write!(f, "[{}]", props.join(","))?;
        }
        Ok(())
    }
}

/// Parses `name` or `name[key=value,...]`.
impl FromStr for BlockState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, rest) = match s.find('[') {
            Some(idx) => (&s[..idx], Some(&s[idx + 1..])),
            None => (s, None),
        };
        if name.is_empty() {
            return Err(format!("missing block name in '{s}'"));
        }
        let mut state = BlockState::new(name);
        if let Some(rest) = rest {
            let body = rest
                .strip_suffix(']')
                .ok_or_else(|| format!("unterminated property list in '{s}'"))?;
            for pair in body.split(',').filter(|p| !p.trim().is_empty()) {
                let (key, value) = pair
                    .split_once('=')
                    .ok_or_else(|| format!("property '{pair}' is not key=value"))?;
                state = state.with_property(key.trim(), value.trim());
            }
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn families_are_recognised_from_names() {
        assert_eq!(BlockFamily::of("air"), BlockFamily::Air);
        assert_eq!(BlockFamily::of("minecraft:cave_air"), BlockFamily::Air);
        assert_eq!(BlockFamily::of("water"), BlockFamily::Liquid);
        assert_eq!(BlockFamily::of("oak_slab"), BlockFamily::Slab);
        assert_eq!(BlockFamily::of("spruce_door"), BlockFamily::Door);
        assert_eq!(BlockFamily::of("oak_trapdoor"), BlockFamily::Solid);
        assert_eq!(BlockFamily::of("trapped_chest"), BlockFamily::Chest);
        assert_eq!(BlockFamily::of("oak_fence"), BlockFamily::Cross);
        assert_eq!(BlockFamily::of("glass_pane"), BlockFamily::Cross);
        assert_eq!(BlockFamily::of("cobblestone_wall"), BlockFamily::Cross);
        assert_eq!(BlockFamily::of("tall_grass"), BlockFamily::Replaceable);
        assert_eq!(BlockFamily::of("stone"), BlockFamily::Solid);
    }

    #[test]
    fn source_and_flowing_liquids() {
        assert!(BlockState::new("water").is_source_liquid());
        assert!(BlockState::new("water").with_property("level", "0").is_source_liquid());
        assert!(!BlockState::new("lava").with_property("level", "3").is_source_liquid());
        assert!(!BlockState::new("stone").is_source_liquid());
    }

    #[test]
    fn orientation_only_differences() {
        let north = BlockState::new("oak_stairs")
            .with_property("facing", "north")
            .with_property("waterlogged", "false");
        let east = BlockState::new("oak_stairs")
            .with_property("facing", "east")
            .with_property("waterlogged", "false");
        let wet = BlockState::new("oak_stairs")
            .with_property("facing", "north")
            .with_property("waterlogged", "true");
        assert!(north.same_without_orientation(&east));
        assert!(!north.same_without_orientation(&wet));
        assert!(!north.same_without_orientation(&BlockState::new("stone")));
    }

    #[test]
    fn base_parts() {
        assert!(BlockState::new("oak_door").with_property("half", "lower").is_base_part());
        assert!(!BlockState::new("oak_door").with_property("half", "upper").is_base_part());
        assert!(!BlockState::new("red_bed").with_property("part", "head").is_base_part());
        assert!(BlockState::new("stone").is_base_part());
    }

    #[test]
    fn parse_and_display_agree() {
        let state: BlockState = "oak_log[axis=y]".parse().unwrap();
        assert_eq!(state.name(), "oak_log");
        assert_eq!(state.property("axis"), Some("y"));
        assert_eq!(state.to_string(), "oak_log[axis=y]");

        let plain: BlockState = " stone ".parse().unwrap();
        assert_eq!(plain, BlockState::new("stone"));

        assert!("oak_log[axis=y".parse::<BlockState>().is_err());
        assert!("[axis=y]".parse::<BlockState>().is_err());
        assert!("oak_log[axis]".parse::<BlockState>().is_err());
    }

    #[test]
    fn replaceable_cells_have_no_collision() {
        assert!(BlockState::air().is_replaceable());
        assert!(BlockState::new("snow").is_replaceable());
        assert!(!BlockState::new("stone").is_replaceable());
        assert!(BlockState::new("stone").has_collision());
    }
}

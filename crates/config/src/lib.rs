//! Configuration loading, validation, and management for Voxelwright.
//!
//! Loads configuration from `~/.voxelwright/config.toml` with environment
//! variable overrides. Validates all settings at startup. The loaded
//! [`BuildConfig`] is an immutable snapshot: the engine receives it by
//! reference every tick and never reads settings from anywhere else.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use voxelwright_core::Coord;

/// The root configuration structure.
///
/// Maps directly to `~/.voxelwright/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Stop a full scan once this many incorrect cells have been found
    #[serde(default = "default_max_incorrect")]
    pub max_incorrect_before_abort: usize,

    /// Radius of the cube rescanned around the agent every tick
    #[serde(default = "default_scan_radius")]
    pub tick_scan_radius: i32,

    /// Layer a new build starts at when layering is enabled
    #[serde(default)]
    pub start_at_layer: i32,

    /// Abandon a layer that cannot be progressed instead of pausing
    #[serde(default)]
    pub skip_failed_layers: bool,

    /// Restrict loaded schematics to the registered selections
    #[serde(default)]
    pub build_only_selection: bool,

    /// Layered (vertical window) building
    #[serde(default)]
    pub layers: LayerConfig,

    /// Repeating the build at a translated origin
    #[serde(default)]
    pub repeat: RepeatConfig,

    /// Axis flips applied to the origin at build time
    #[serde(default)]
    pub orientation: OrientationConfig,

    /// Tolerances of the validity predicate
    #[serde(default)]
    pub validity: ValidityConfig,

    /// Goal and cost settings shared with the planner
    #[serde(default)]
    pub planner: PlannerConfig,

    /// Inventory handling
    #[serde(default)]
    pub inventory: InventoryConfig,
}

fn default_max_incorrect() -> usize {
    100
}
fn default_scan_radius() -> i32 {
    5
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_layer_height")]
    pub height: i32,

    /// Build the topmost layer first
    #[serde(default)]
    pub top_down: bool,
}

fn default_layer_height() -> i32 {
    1
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            height: default_layer_height(),
            top_down: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatConfig {
    /// Translation applied to the origin after each completion; zero disables
    #[serde(default)]
    pub vector: Coord,

    /// Total number of copies, -1 for unlimited
    #[serde(default = "default_repeat_count")]
    pub count: i32,

    /// Keep schematic state between copies instead of resetting it
    #[serde(default)]
    pub sneaky: bool,
}

fn default_repeat_count() -> i32 {
    -1
}

impl Default for RepeatConfig {
    fn default() -> Self {
        Self {
            vector: Coord::ZERO,
            count: default_repeat_count(),
            sneaky: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrientationConfig {
    #[serde(default)]
    pub flip_x: bool,
    #[serde(default)]
    pub flip_y: bool,
    #[serde(default)]
    pub flip_z: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidityConfig {
    /// Any liquid counts as correct
    #[serde(default)]
    pub water_is_fine: bool,

    /// Rotation-only differences count as correct
    #[serde(default)]
    pub ignore_orientation: bool,

    /// Desired materials for which an empty cell is acceptable
    #[serde(default)]
    pub accept_empty_for_materials: Vec<String>,

    /// Materials that may stay where the pattern wants nothing
    #[serde(default)]
    pub ignore_materials_when_empty_desired: Vec<String>,

    /// Desired materials that are never required
    #[serde(default)]
    pub skip_materials: Vec<String>,

    /// Desired material → materials accepted in its place
    #[serde(default)]
    pub substitute_materials: BTreeMap<String, Vec<String>>,

    /// Desired material → alternatives the schematic itself swaps in
    #[serde(default)]
    pub schematic_substitutes: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    #[serde(default = "default_true")]
    pub allow_break: bool,

    #[serde(default = "default_true")]
    pub allow_place: bool,

    /// Offer "stand on top" as a fallback goal for blocks with free space above
    #[serde(default)]
    pub break_from_above_allowed: bool,

    /// Let the nearby-break search mine one level below the feet
    #[serde(default)]
    pub break_below_feet: bool,

    /// Base cost of placing a block
    #[serde(default = "default_place_penalty")]
    pub block_place_penalty: f64,

    /// Break cost multiplier for a block that is already correct
    #[serde(default = "default_break_correct_penalty")]
    pub break_correct_block_penalty: f64,

    #[serde(default = "default_reach")]
    pub reach_distance: f64,

    /// Radius searched for immediate break/place interactions
    #[serde(default = "default_nearby_radius")]
    pub nearby_radius: i32,

    /// Ticks a placement waits after a break
    #[serde(default = "default_cooldown")]
    pub place_cooldown_ticks: i32,
}

fn default_place_penalty() -> f64 {
    20.0
}
fn default_break_correct_penalty() -> f64 {
    10.0
}
fn default_reach() -> f64 {
    4.5
}
fn default_nearby_radius() -> i32 {
    5
}
fn default_cooldown() -> i32 {
    5
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            allow_break: true,
            allow_place: true,
            break_from_above_allowed: false,
            break_below_feet: false,
            block_place_penalty: default_place_penalty(),
            break_correct_block_penalty: default_break_correct_penalty(),
            reach_distance: default_reach(),
            nearby_radius: default_nearby_radius(),
            place_cooldown_ticks: default_cooldown(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// Swap wanted materials from storage slots into priority slots
    #[serde(default)]
    pub allow_inventory: bool,

    #[serde(default = "default_priority_slots")]
    pub priority_slots: usize,

    /// Materials the planner may use as scaffolding
    #[serde(default = "default_throwaway")]
    pub throwaway_materials: Vec<String>,
}

fn default_priority_slots() -> usize {
    9
}
fn default_throwaway() -> Vec<String> {
    vec![
        "dirt".into(),
        "cobblestone".into(),
        "netherrack".into(),
        "stone".into(),
    ]
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            allow_inventory: false,
            priority_slots: default_priority_slots(),
            throwaway_materials: default_throwaway(),
        }
    }
}

impl BuildConfig {
    /// Load configuration from the default path (~/.voxelwright/config.toml).
    ///
    /// Also checks environment variables:
    /// - `VOXELWRIGHT_SCAN_RADIUS`
    /// - `VOXELWRIGHT_LAYER_HEIGHT`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        // Environment variable overrides (highest priority)
        if let Some(radius) = env_number("VOXELWRIGHT_SCAN_RADIUS")? {
            config.tick_scan_radius = radius;
        }
        if let Some(height) = env_number("VOXELWRIGHT_LAYER_HEIGHT")? {
            config.layers.height = height;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config = Self::from_toml(&content).map_err(|e| match e {
            ConfigError::ParseError { reason, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })?;
        tracing::debug!(path = %path.display(), "Loaded build configuration");
        Ok(config)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::from("<inline>"),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".voxelwright")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_incorrect_before_abort == 0 {
            return Err(ConfigError::ValidationError(
                "max_incorrect_before_abort must be > 0".into(),
            ));
        }
        if self.tick_scan_radius < 0 {
            return Err(ConfigError::ValidationError(
                "tick_scan_radius must be >= 0".into(),
            ));
        }
        if self.start_at_layer < 0 {
            return Err(ConfigError::ValidationError(
                "start_at_layer must be >= 0".into(),
            ));
        }
        if self.layers.height <= 0 {
            return Err(ConfigError::ValidationError(
                "layers.height must be > 0".into(),
            ));
        }
        if self.repeat.count < -1 {
            return Err(ConfigError::ValidationError(
                "repeat.count must be -1 (unlimited) or >= 0".into(),
            ));
        }
        if self.planner.reach_distance <= 0.0 {
            return Err(ConfigError::ValidationError(
                "planner.reach_distance must be > 0".into(),
            ));
        }
        if self.planner.nearby_radius < 0 {
            return Err(ConfigError::ValidationError(
                "planner.nearby_radius must be >= 0".into(),
            ));
        }
        if self.planner.block_place_penalty < 0.0 || self.planner.break_correct_block_penalty < 0.0
        {
            return Err(ConfigError::ValidationError(
                "planner penalties must be >= 0".into(),
            ));
        }
        if self.inventory.priority_slots == 0 {
            return Err(ConfigError::ValidationError(
                "inventory.priority_slots must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Whether layered building is on.
    pub fn layering(&self) -> bool {
        self.layers.enabled
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            max_incorrect_before_abort: default_max_incorrect(),
            tick_scan_radius: default_scan_radius(),
            start_at_layer: 0,
            skip_failed_layers: false,
            build_only_selection: false,
            layers: LayerConfig::default(),
            repeat: RepeatConfig::default(),
            orientation: OrientationConfig::default(),
            validity: ValidityConfig::default(),
            planner: PlannerConfig::default(),
            inventory: InventoryConfig::default(),
        }
    }
}

fn env_number<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map(Some).map_err(|_| {
            ConfigError::ValidationError(format!("{key} must be a number, got '{raw}'"))
        }),
        Err(_) => Ok(None),
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

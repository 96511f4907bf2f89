//! # Voxelwright Core
//!
//! Domain types, collaborator traits, and error definitions for the
//! Voxelwright schematic builder. This crate knows nothing about the
//! reconciliation engine itself; it defines the world model that the
//! engine and its hosts implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (the block grid, the inventory, the pattern
//! being built) is a trait here. Implementations live with the host. This
//! enables:
//! - Driving the engine from a real game client or from a simulation
//! - Easy testing with the in-memory doubles in [`world`] and [`inventory`]
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod coord;
pub mod block;
pub mod schematic;
pub mod world;
pub mod inventory;
pub mod goal;
pub mod agent;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use coord::{Coord, Extent, Face, Region};
pub use block::{BlockFamily, BlockState};
pub use schematic::{Schematic, SchematicRef, SchematicSource};
pub use world::{BlockOracle, InMemoryWorld};
pub use inventory::{Inventory, SlotInventory};
pub use goal::{CompositeMode, Goal, GoalMode};
pub use agent::AgentStatus;
pub use event::{BuildEvent, EventBus};

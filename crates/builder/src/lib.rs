//! The build engine: keeps a live voxel world converging on a schematic.
//!
//! Every scheduling tick the [`SessionController`] refreshes the set of
//! wrong cells, asks the [`GoalSynthesizer`] for a composite goal, and
//! hands that goal (plus a [`CostContext`] snapshot) to an external planner.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌──────────────┐
//! │   Session    │──▶│  Reconciliation  │──▶│     Goal     │
//! │  Controller  │   │     Engine       │   │  Synthesizer │
//! └──────────────┘   └──────────────────┘   └──────────────┘
//!        │                    │                     │
//!        │              ┌─────┴─────┐               │
//!        │              │  Retry    │◀──────────────┘
//!        │              │  Limiter  │
//!        ▼              └───────────┘
//! ┌──────────────┐
//! │ PathingCmd + │──▶ external planner
//! │ CostContext  │
//! └──────────────┘
//! ```
//!
//! All correctness decisions go through one predicate, [`validity::is_valid`],
//! so the reconciler and the cost model always agree on what "done" means.

pub mod cost;
pub mod nearby;
pub mod reconcile;
pub mod retry;
pub mod session;
pub mod synth;
pub mod validity;
pub mod view;

pub use cost::{COST_INF, CostContext};
pub use nearby::Placement;
pub use reconcile::{ReconciliationEngine, ScanContext, ScanSummary};
pub use retry::{BreakHistory, RETRY_THRESHOLD, RetryLimiter, RetryState};
pub use session::{
    Interaction, PathingCommand, SessionController, SessionPhase, SessionSnapshot, TickOutcome,
};
pub use synth::{GoalSynthesizer, Synthesis};
pub use validity::is_valid;
pub use view::SchematicView;

use voxelwright_core::error::SchematicError;

/// Errors surfaced to callers of the build engine.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("build '{name}' rejected: {source}")]
    Rejected {
        name: String,
        #[source]
        source: SchematicError,
    },

    #[error("schematic '{name}' has no buildable volume ({extent})")]
    EmptyVolume {
        name: String,
        extent: voxelwright_core::Extent,
    },
}

impl From<BuildError> for voxelwright_core::Error {
    fn from(err: BuildError) -> Self {
        match err {
            BuildError::Rejected { source, .. } => Self::Schematic(source),
            BuildError::EmptyVolume { extent, .. } => {
                Self::Schematic(SchematicError::InvalidExtent {
                    width: extent.width,
                    height: extent.height,
                    length: extent.length,
                })
            }
        }
    }
}

//! What the planner/executor reports about the agent each tick.

use serde::{Deserialize, Serialize};

use crate::coord::Coord;

/// Per-tick agent state supplied by the planner/executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStatus {
    /// Block position of the agent's feet.
    pub feet: Coord,

    /// Standing on something solid (not falling, swimming or mid-jump).
    pub on_ground: bool,

    /// The executor can drop its current movement without harm.
    pub safe_to_interrupt: bool,

    /// An outer controller has suspended all block interactions.
    #[serde(default)]
    pub interactions_paused: bool,
}

impl AgentStatus {
    /// A grounded, interruptible agent standing at `feet`.
    pub fn idle_at(feet: Coord) -> Self {
        Self {
            feet,
            on_ground: true,
            safe_to_interrupt: true,
            interactions_paused: false,
        }
    }

    /// Whether an immediate break or place may pre-empt the current path.
    pub fn can_interact(&self) -> bool {
        self.on_ground && self.safe_to_interrupt && !self.interactions_paused
    }

    /// The eye position used for reach checks, in block units.
    pub fn eye(&self) -> (f64, f64, f64) {
        (
            f64::from(self.feet.x) + 0.5,
            f64::from(self.feet.y) + 1.62,
            f64::from(self.feet.z) + 0.5,
        )
    }

    /// Whether the centre of `target` is within `reach` of the eyes.
    pub fn within_reach(&self, target: Coord, reach: f64) -> bool {
        let (ex, ey, ez) = self.eye();
        let dx = f64::from(target.x) + 0.5 - ex;
        let dy = f64::from(target.y) + 0.5 - ey;
        let dz = f64::from(target.z) + 0.5 - ez;
        dx * dx + dy * dy + dz * dz <= reach * reach
    }

    /// Whether the agent's two-block-tall body occupies `cell`.
    pub fn occupies(&self, cell: Coord) -> bool {
        cell == self.feet || cell == self.feet.above()
    }
}

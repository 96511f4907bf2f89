//! Build lifecycle events.
//!
//! The session controller publishes an event whenever a build changes
//! phase. Hosts subscribe to drive progress displays or notifications
//! without the engine knowing who is listening.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::coord::Coord;

/// All lifecycle events a build session emits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BuildEvent {
    /// A new build target was accepted
    Started {
        name: String,
        origin: Coord,
        nested: bool,
        timestamp: DateTime<Utc>,
    },

    /// The vertical window moved on after its cells were resolved
    LayerAdvanced {
        name: String,
        layer: i32,
        timestamp: DateTime<Utc>,
    },

    /// A layer was abandoned because nothing in it could be acted on
    LayerSkipped {
        name: String,
        layer: i32,
        timestamp: DateTime<Utc>,
    },

    /// The whole pattern was translated for another copy
    Repeating {
        name: String,
        origin: Coord,
        repeat: u32,
        timestamp: DateTime<Utc>,
    },

    /// The build is complete
    Finished {
        name: String,
        resumed_previous: bool,
        timestamp: DateTime<Utc>,
    },

    Paused {
        name: String,
        timestamp: DateTime<Utc>,
    },

    Resumed {
        name: String,
        timestamp: DateTime<Utc>,
    },

    /// No goal could be synthesized; operator action needed
    Stalled {
        name: String,
        layer: i32,
        missing: BTreeMap<String, usize>,
        timestamp: DateTime<Utc>,
    },

    /// Materials that were wanted but not held
    MissingMaterials {
        name: String,
        missing: BTreeMap<String, usize>,
        timestamp: DateTime<Utc>,
    },
}

impl BuildEvent {
    /// The build the event belongs to.
    pub fn build_name(&self) -> &str {
        match self {
            Self::Started { name, .. }
            | Self::LayerAdvanced { name, .. }
            | Self::LayerSkipped { name, .. }
            | Self::Repeating { name, .. }
            | Self::Finished { name, .. }
            | Self::Paused { name, .. }
            | Self::Resumed { name, .. }
            | Self::Stalled { name, .. }
            | Self::MissingMaterials { name, .. } => name,
        }
    }
}

/// A broadcast-based event bus for build events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub. Cloning the
/// bus yields another handle onto the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<BuildEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: BuildEvent) {
        // Ignore send errors (no subscribers = that's fine)
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<BuildEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

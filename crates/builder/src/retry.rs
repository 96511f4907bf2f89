//! Break/place oscillation tracking.
//!
//! Some cells never stay correct: a protected block, a falling block, a
//! pattern cell the world rewrites. Each break followed by a placement at
//! the same cell counts as one failed cycle; past [`RETRY_THRESHOLD`]
//! cycles the cell is treated as accepted so a build always terminates.

use std::collections::HashMap;

use voxelwright_core::Coord;

/// A cell is exhausted once its cycle count exceeds this.
pub const RETRY_THRESHOLD: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// No break is awaiting a placement.
    Settled,
    /// A break was noted; the next placement completes a cycle.
    JustBroken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakHistory {
    pub attempts: u32,
    pub state: RetryState,
}

impl BreakHistory {
    fn new(state: RetryState) -> Self {
        Self { attempts: 0, state }
    }
}

/// Per-coordinate break history. Entries are created lazily.
#[derive(Debug, Clone, Default)]
pub struct RetryLimiter {
    entries: HashMap<Coord, BreakHistory>,
}

impl RetryLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A break was started at `at`.
    pub fn note_break(&mut self, at: Coord) {
        let entry = self
            .entries
            .entry(at)
            .or_insert_with(|| BreakHistory::new(RetryState::Settled));
        entry.state = RetryState::JustBroken;
        tracing::trace!(at = %at, attempts = entry.attempts, "Noted break");
    }

    /// Something was placed (or is about to be placed) at `at`.
    pub fn note_insert(&mut self, at: Coord) {
        match self.entries.get_mut(&at) {
            Some(entry) if entry.state == RetryState::JustBroken => {
                entry.attempts += 1;
                entry.state = RetryState::Settled;
                tracing::trace!(at = %at, attempts = entry.attempts, "Break/place cycle completed");
                if entry.attempts == RETRY_THRESHOLD + 1 {
                    tracing::warn!(at = %at, "Giving up on cell after repeated break/place cycles");
                }
            }
            Some(_) => {}
            None => {
                self.entries
                    .insert(at, BreakHistory::new(RetryState::Settled));
            }
        }
    }

    /// Whether `at` has used up its retry budget.
    pub fn is_exhausted(&self, at: Coord) -> bool {
        self.entries
            .get(&at)
            .is_some_and(|entry| entry.attempts > RETRY_THRESHOLD)
    }

    pub fn history(&self, at: Coord) -> Option<BreakHistory> {
        self.entries.get(&at).copied()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

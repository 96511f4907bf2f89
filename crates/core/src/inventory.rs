//! The agent's held materials.

use std::collections::HashSet;

use crate::block::BlockState;

/// Inventory access consumed by the builder.
///
/// Slots are ordered; the first [`priority_slot_count`](Inventory::priority_slot_count)
/// are the ones the agent can use without rummaging (a hotbar).
pub trait Inventory {
    /// The state each slot would place, `None` for empty or non-block slots.
    fn slots(&self) -> Vec<Option<BlockState>>;

    fn priority_slot_count(&self) -> usize;

    /// Move the item in `slot` into a priority slot that is not in `keep`.
    /// Returns whether anything moved.
    fn swap_into_priority(&mut self, slot: usize, keep: &[usize]) -> bool;

    /// Protected materials must not be thrown away as scaffolding.
    fn is_protected(&self, material: &str) -> bool;

    fn protect(&mut self, material: &str);

    fn release(&mut self, material: &str);
}

/// One stack of a single material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stack {
    pub state: BlockState,
    pub count: u32,
}

/// A fixed-size slot array. Used by the simulator and by tests.
#[derive(Debug, Clone)]
pub struct SlotInventory {
    slots: Vec<Option<Stack>>,
    priority: usize,
    protected: HashSet<String>,
}

impl SlotInventory {
    /// `size` slots, of which the first `priority` are priority slots.
    pub fn new(size: usize, priority: usize) -> Self {
        Self {
            slots: vec![None; size],
            priority: priority.min(size),
            protected: HashSet::new(),
        }
    }

    /// 36 slots with a 9-slot hotbar.
    pub fn standard() -> Self {
        Self::new(36, 9)
    }

    pub fn with_stack(mut self, slot: usize, state: BlockState, count: u32) -> Self {
        self.put(slot, state, count);
        self
    }

    pub fn put(&mut self, slot: usize, state: BlockState, count: u32) {
        if let Some(cell) = self.slots.get_mut(slot) {
            *cell = (count > 0).then_some(Stack { state, count });
        }
    }

    pub fn stack(&self, slot: usize) -> Option<&Stack> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    /// Consume one item from `slot`, returning the state it places.
    pub fn take(&mut self, slot: usize) -> Option<BlockState> {
        let cell = self.slots.get_mut(slot)?;
        let stack = cell.as_mut()?;
        let state = stack.state.clone();
        stack.count -= 1;
        if stack.count == 0 {
            *cell = None;
        }
        Some(state)
    }

    /// Total count of `material` across all slots.
    pub fn count_of(&self, material: &str) -> u32 {
        self.slots
            .iter()
            .flatten()
            .filter(|s| s.state.name() == material)
            .map(|s| s.count)
            .sum()
    }

    fn temp_slot(&self, keep: &[usize]) -> Option<usize> {
        // First and last priority slots are left for tools and scaffolding.
        let range = if self.priority > 2 {
            1..self.priority - 1
        } else {
            0..self.priority
        };
        let free = range
            .clone()
            .find(|i| self.slots[*i].is_none() && !keep.contains(i));
        free.or_else(|| range.clone().find(|i| !keep.contains(i)))
    }
}

impl Default for SlotInventory {
    fn default() -> Self {
        Self::standard()
    }
}

impl Inventory for SlotInventory {
    fn slots(&self) -> Vec<Option<BlockState>> {
        self.slots
            .iter()
            .map(|s| s.as_ref().map(|s| s.state.clone()))
            .collect()
    }

    fn priority_slot_count(&self) -> usize {
        self.priority
    }

    fn swap_into_priority(&mut self, slot: usize, keep: &[usize]) -> bool {
        if slot < self.priority || slot >= self.slots.len() {
            return false;
        }
        match self.temp_slot(keep) {
            Some(dest) => {
                self.slots.swap(slot, dest);
                tracing::debug!(from = slot, to = dest, "Swapped stack into priority slot");
                true
            }
            None => false,
        }
    }

    fn is_protected(&self, material: &str) -> bool {
        self.protected.contains(material)
    }

    fn protect(&mut self, material: &str) {
        self.protected.insert(material.to_string());
    }

    fn release(&mut self, material: &str) {
        self.protected.remove(material);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_consumes_and_empties() {
        let mut inv = SlotInventory::standard().with_stack(0, BlockState::new("stone"), 2);
        assert_eq!(inv.count_of("stone"), 2);
        assert_eq!(inv.take(0), Some(BlockState::new("stone")));
        assert_eq!(inv.take(0), Some(BlockState::new("stone")));
        assert_eq!(inv.take(0), None);
        assert!(inv.slots()[0].is_none());
    }

    #[test]
    fn swap_prefers_empty_middle_slot() {
        let mut inv = SlotInventory::standard()
            .with_stack(1, BlockState::new("dirt"), 64)
            .with_stack(20, BlockState::new("glass"), 5);
        assert!(inv.swap_into_priority(20, &[]));
        assert_eq!(inv.stack(2).map(|s| s.state.name()), Some("glass"));
        assert!(inv.stack(20).is_none());
    }

    #[test]
    fn swap_respects_kept_slots() {
        let mut inv = SlotInventory::new(4, 3).with_stack(3, BlockState::new("glass"), 1);
        // Only slot 1 is a temp slot with 3 priority slots.
        assert!(!inv.swap_into_priority(3, &[1]));
        assert!(inv.swap_into_priority(3, &[]));
        assert_eq!(inv.stack(1).map(|s| s.state.name()), Some("glass"));
    }

    #[test]
    fn priority_slots_are_not_swapped() {
        let mut inv = SlotInventory::standard().with_stack(4, BlockState::new("dirt"), 1);
        assert!(!inv.swap_into_priority(4, &[]));
    }

    #[test]
    fn protection_flags() {
        let mut inv = SlotInventory::standard();
        inv.protect("stone");
        assert!(inv.is_protected("stone"));
        inv.release("stone");
        assert!(!inv.is_protected("stone"));
    }
}

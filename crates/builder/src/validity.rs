//! The tolerant equivalence between a current and a desired block.

use voxelwright_config::ValidityConfig;
use voxelwright_core::{BlockFamily, BlockState};

/// Whether `current` satisfies `desired`.
///
/// `strict` is used when asking "would this item place the right thing",
/// where the ignore-list, skip-list and substitutes must not apply.
/// A cell without a desired state is always valid.
pub fn is_valid(
    config: &ValidityConfig,
    current: &BlockState,
    desired: Option<&BlockState>,
    strict: bool,
) -> bool {
    let Some(desired) = desired else {
        return true;
    };
    if current.is_liquid() && config.water_is_fine {
        return true;
    }
    if current.is_air() && desired.is_air() {
        return true;
    }
    if current.is_air() && listed(&config.accept_empty_for_materials, desired) {
        return true;
    }
    if !strict && desired.is_air() && listed(&config.ignore_materials_when_empty_desired, current) {
        return true;
    }
    if !strict && listed(&config.skip_materials, desired) {
        return true;
    }
    if desired.family() == BlockFamily::Slab {
        return true;
    }
    match (current.family(), desired.family()) {
        (BlockFamily::Chest, BlockFamily::Chest) | (BlockFamily::Door, BlockFamily::Door) => {
            return true;
        }
        (BlockFamily::Cross, BlockFamily::Cross) if current.same_block(desired) => return true,
        _ => {}
    }
    if !strict
        && config
            .substitute_materials
            .get(desired.name())
            .is_some_and(|alts| alts.iter().any(|alt| alt == current.name()))
    {
        return true;
    }
    if current == desired {
        return true;
    }
    config.ignore_orientation && current.same_without_orientation(desired)
}

fn listed(list: &[String], state: &BlockState) -> bool {
    list.iter().any(|name| name == state.name())
}

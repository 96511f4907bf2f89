//! End-to-end build scenarios driven through the public builder API, with
//! the test acting as a perfect executor of every command it receives.

use std::collections::HashSet;
use std::sync::Arc;

use voxelwright_builder::{
    GoalSynthesizer, Interaction, PathingCommand, ReconciliationEngine, RetryLimiter,
    ScanContext, SchematicView, SessionController, SessionPhase, TickOutcome,
};
use voxelwright_config::{BuildConfig, LayerConfig};
use voxelwright_core::schematic::{FillSchematic, GridSchematic};
use voxelwright_core::{
    AgentStatus, BlockOracle, BlockState, BuildEvent, CompositeMode, Coord, EventBus, Extent, Goal,
    GoalMode, InMemoryWorld, Inventory, Region, SchematicRef, SlotInventory,
};

const FEET: Coord = Coord::new(0, 64, 0);

fn floor() -> InMemoryWorld {
    let mut world = InMemoryWorld::new();
    world.fill(
        Region::spanning(Coord::new(-8, 63, -8), Coord::new(8, 63, 8)),
        &BlockState::new("dirt"),
    );
    world
}

fn column(height: i32, block: &str) -> SchematicRef {
    Arc::new(FillSchematic::new(
        Extent::new(1, height, 1),
        BlockState::new(block),
    ))
}

fn stone_inventory() -> SlotInventory {
    SlotInventory::standard().with_stack(0, BlockState::new("stone"), 64)
}

/// The first leaf of the primary branch of a goal.
fn primary_leaf(goal: &Goal) -> &Goal {
    match goal {
        Goal::Composite { children, .. } => children.first().map_or(goal, primary_leaf),
        leaf => leaf,
    }
}

/// Carry out a command the way a planner and an interaction layer would.
fn execute(
    ctl: &SessionController,
    world: &mut InMemoryWorld,
    inventory: &mut SlotInventory,
    command: &PathingCommand,
) {
    if let Some(interaction) = &command.interaction {
        match interaction {
            Interaction::Break { target } => world.set(*target, BlockState::air()),
            Interaction::Place {
                target, slot, state, ..
            } => {
                inventory.take(*slot);
                world.set(*target, state.clone());
            }
        }
        return;
    }
    let Some(goal) = &command.goal else {
        return;
    };
    match primary_leaf(goal) {
        Goal::Adjacent { target, .. } | Goal::Place { target } => {
            if let Some(state) = ctl.desired_at(*target, &world.get(*target)) {
                world.set(*target, state);
            }
        }
        Goal::Break { target } => world.set(*target, BlockState::air()),
        _ => {}
    }
}

fn expect_command(outcome: TickOutcome) -> PathingCommand {
    match outcome {
        TickOutcome::Command(command) => command,
        other => panic!("expected a command, got {other:?}"),
    }
}

// ── Reconciliation ────────────────────────────────────────────────────────

#[test]
fn cells_outside_the_schematic_are_never_incorrect() {
    let mut world = floor();
    for x in -3..6 {
        world.set(Coord::new(x, 64, -1), BlockState::new("cobblestone"));
        world.set(Coord::new(x, 66, 3), BlockState::new("gravel"));
    }
    let view = SchematicView::new(column(2, "stone"), Coord::new(2, 64, 0), vec![]);
    let retry = RetryLimiter::new();
    let config = BuildConfig::default();
    let ctx = ScanContext::new(&view, &world, &retry, &config);

    let mut engine = ReconciliationEngine::new();
    assert!(engine.refresh(&ctx, FEET));
    let bounds = view.bounds().unwrap();
    let incorrect = engine.incorrect().unwrap();
    assert_eq!(incorrect.len(), 2);
    assert!(incorrect.iter().all(|at| bounds.contains(*at)));
}

#[test]
fn local_rescan_over_everything_matches_full_scan() {
    let mut world = floor();
    world.set(Coord::new(1, 64, 1), BlockState::new("stone"));
    world.set(Coord::new(2, 65, 0), BlockState::new("dirt"));
    let view = SchematicView::new(
        Arc::new(FillSchematic::new(Extent::new(3, 2, 3), BlockState::new("stone"))),
        Coord::new(0, 64, 0),
        vec![],
    );
    let retry = RetryLimiter::new();
    let config = BuildConfig::default();
    let ctx = ScanContext::new(&view, &world, &retry, &config);

    let mut engine = ReconciliationEngine::new();
    engine.full_scan(&ctx);
    let after_full: HashSet<Coord> = engine.incorrect().unwrap().clone();
    engine.local_rescan(&ctx, Coord::new(1, 64, 1), 3);
    assert_eq!(engine.incorrect().unwrap(), &after_full);
    assert_eq!(after_full.len(), 17);
}

#[test]
fn correct_cells_are_never_incorrect() {
    let mut world = floor();
    let grid = GridSchematic::new(Extent::new(3, 1, 1))
        .with_cell(
            Coord::new(0, 0, 0),
            BlockState::new("oak_stairs").with_property("facing", "north"),
        )
        .with_cell(Coord::new(1, 0, 0), BlockState::new("stone"))
        .with_cell(Coord::new(2, 0, 0), BlockState::new("glass"));
    world.set(
        Coord::new(0, 64, 0),
        BlockState::new("oak_stairs").with_property("facing", "east"),
    );
    world.set(Coord::new(1, 64, 0), BlockState::new("stone"));

    let view = SchematicView::new(Arc::new(grid), Coord::new(0, 64, 0), vec![]);
    let retry = RetryLimiter::new();
    let mut config = BuildConfig::default();
    config.validity.ignore_orientation = true;
    let ctx = ScanContext::new(&view, &world, &retry, &config);

    let mut engine = ReconciliationEngine::new();
    engine.full_scan(&ctx);
    assert!(!engine.is_incorrect(Coord::new(0, 64, 0)));
    assert!(!engine.is_incorrect(Coord::new(1, 64, 0)));
    assert!(engine.is_incorrect(Coord::new(2, 64, 0)));
}

// ── Goal synthesis ────────────────────────────────────────────────────────

#[test]
fn primary_first_heuristic_ignores_a_closer_fallback() {
    let mut world = floor();
    // A wrong block right next to the agent, and a far cell to fill.
    world.set(Coord::new(1, 64, 0), BlockState::new("dirt"));
    let grid = GridSchematic::new(Extent::new(8, 1, 1))
        .with_cell(Coord::new(0, 0, 0), BlockState::air())
        .with_cell(Coord::new(7, 0, 0), BlockState::new("stone"));
    let view = SchematicView::new(Arc::new(grid), Coord::new(1, 64, 0), vec![]);
    let retry = RetryLimiter::new();
    let config = BuildConfig::default();
    let ctx = ScanContext::new(&view, &world, &retry, &config);
    let agent = AgentStatus::idle_at(FEET);

    let incorrect: HashSet<Coord> = [Coord::new(1, 64, 0), Coord::new(8, 64, 0)].into();
    let synthesis = GoalSynthesizer::new(ctx, &agent).assemble(
        &incorrect,
        &[BlockState::new("stone")],
        false,
    );
    let goal = synthesis.goal.unwrap();
    let Goal::Composite {
        children,
        mode: CompositeMode::PrimaryFirst,
    } = &goal
    else {
        panic!("expected a primary-first composite, got {goal:?}");
    };

    let primary = children[0].heuristic(FEET);
    let fallback = children[1].heuristic(FEET);
    assert!(fallback < primary);
    assert_eq!(goal.heuristic(FEET), primary);
    // The fallback is already satisfied where the agent stands.
    assert!(goal.is_in_goal(FEET));
}

// ── Sessions ──────────────────────────────────────────────────────────────

#[test]
fn height_three_column_is_built_bottom_up() {
    let mut world = floor();
    let mut inventory = stone_inventory();
    let agent = AgentStatus::idle_at(FEET);
    let mut ctl = SessionController::new(Arc::new(BuildConfig::default()));
    ctl.build("column", column(3, "stone"), Coord::new(1, 64, 0));

    // Tick 1: the bottom cell is placed directly.
    let command = expect_command(ctl.tick(&world, &mut inventory, &agent));
    assert_eq!(ctl.incorrect_count(), 3);
    match &command.interaction {
        Some(Interaction::Place {
            target,
            against,
            state,
            ..
        }) => {
            assert_eq!(*target, Coord::new(1, 64, 0));
            assert_eq!(*against, Coord::new(1, 63, 0));
            assert_eq!(state, &BlockState::new("stone"));
        }
        other => panic!("expected a placement, got {other:?}"),
    }
    execute(&ctl, &mut world, &mut inventory, &command);

    // Tick 2: head height is not placed blind; the planner gets a goal
    // for the middle cell only.
    let command = expect_command(ctl.tick(&world, &mut inventory, &agent));
    assert_eq!(ctl.incorrect_count(), 2);
    assert!(command.interaction.is_none());
    assert_eq!(command.mode, GoalMode::ForceRevalidate);
    assert!(command.cost.is_some());
    let goal = command.goal.as_ref().unwrap();
    assert!(matches!(
        primary_leaf(goal),
        Goal::Adjacent { target, .. } if *target == Coord::new(1, 65, 0)
    ));
    execute(&ctl, &mut world, &mut inventory, &command);

    // Tick 3: the top cell now has support.
    let command = expect_command(ctl.tick(&world, &mut inventory, &agent));
    assert_eq!(ctl.incorrect_count(), 1);
    assert!(matches!(
        command.interaction,
        Some(Interaction::Place { target, .. }) if target == Coord::new(1, 66, 0)
    ));
    execute(&ctl, &mut world, &mut inventory, &command);

    match ctl.tick(&world, &mut inventory, &agent) {
        TickOutcome::Finished { name, .. } => assert_eq!(name, "column"),
        other => panic!("expected the build to finish, got {other:?}"),
    }
    assert_eq!(ctl.phase(), SessionPhase::Idle);
    assert_eq!(inventory.count_of("stone"), 62);
}

#[test]
fn repeat_translates_origin_until_count_is_reached() {
    let mut config = BuildConfig::default();
    config.repeat.vector = Coord::new(0, 0, 5);
    config.repeat.count = 2;
    let bus = EventBus::new(64);
    let mut rx = bus.subscribe();
    let mut world = floor();
    let mut inventory = stone_inventory();
    let agent = AgentStatus::idle_at(FEET);
    let mut ctl = SessionController::new(Arc::new(config)).with_events(bus);
    ctl.build("post", column(1, "stone"), Coord::new(1, 64, 0));

    let mut finished = false;
    for _ in 0..10 {
        match ctl.tick(&world, &mut inventory, &agent) {
            TickOutcome::Command(command) => execute(&ctl, &mut world, &mut inventory, &command),
            TickOutcome::Finished { .. } => {
                finished = true;
                break;
            }
            TickOutcome::Idle => break,
        }
    }
    assert!(finished);
    assert_eq!(world.get(Coord::new(1, 64, 0)), BlockState::new("stone"));
    assert_eq!(world.get(Coord::new(1, 64, 5)), BlockState::new("stone"));
    assert!(world.get(Coord::new(1, 64, 10)).is_air());

    let mut repeats = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let BuildEvent::Repeating { origin, repeat, .. } = event.as_ref() {
            repeats.push((*origin, *repeat));
        }
    }
    assert_eq!(repeats, vec![(Coord::new(1, 64, 5), 1)]);
}

#[test]
fn oscillating_cell_is_given_up_after_eleven_cycles() {
    let mut world = floor();
    let target = Coord::new(1, 64, 0);
    world.set(target, BlockState::new("dirt"));
    let mut inventory = SlotInventory::standard();
    let agent = AgentStatus::idle_at(FEET);
    let mut ctl = SessionController::new(Arc::new(BuildConfig::default()));
    ctl.build("clear", column(1, "air"), target);

    let mut breaks = 0;
    let finished = loop {
        assert!(breaks <= 11, "cell was never given up");
        match ctl.tick(&world, &mut inventory, &agent) {
            TickOutcome::Command(PathingCommand {
                interaction: Some(Interaction::Break { target: broken }),
                ..
            }) => {
                assert_eq!(broken, target);
                breaks += 1;
                // Something puts the block straight back.
                ctl.note_insert(target);
            }
            TickOutcome::Finished { .. } => break true,
            other => panic!("unexpected outcome {other:?}"),
        }
    };
    assert!(finished);
    assert_eq!(breaks, 11);
    assert_eq!(world.get(target), BlockState::new("dirt"));
}

#[test]
fn layers_are_built_one_at_a_time() {
    let config = BuildConfig {
        layers: LayerConfig {
            enabled: true,
            height: 1,
            top_down: false,
        },
        ..BuildConfig::default()
    };
    let bus = EventBus::new(64);
    let mut rx = bus.subscribe();
    let mut world = floor();
    let mut inventory = stone_inventory();
    let agent = AgentStatus::idle_at(FEET);
    let mut ctl = SessionController::new(Arc::new(config)).with_events(bus);
    ctl.build("layered", column(3, "stone"), Coord::new(1, 64, 0));

    let mut ticks = 0;
    loop {
        ticks += 1;
        assert!(ticks <= 10, "layered build did not finish");
        match ctl.tick(&world, &mut inventory, &agent) {
            TickOutcome::Command(command) => {
                // Nothing above the current layer is ever targeted.
                let layer = ctl.session().unwrap().layer();
                let target = match (&command.interaction, &command.goal) {
                    (Some(Interaction::Place { target, .. }), _) => Some(*target),
                    (None, Some(goal)) => match primary_leaf(goal) {
                        Goal::Adjacent { target, .. } => Some(*target),
                        _ => None,
                    },
                    _ => None,
                };
                if let Some(target) = target {
                    assert!(target.y - 64 < layer);
                }
                execute(&ctl, &mut world, &mut inventory, &command);
            }
            TickOutcome::Finished { .. } => break,
            TickOutcome::Idle => panic!("session vanished"),
        }
    }
    assert_eq!(ticks, 4);

    let mut layers = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let BuildEvent::LayerAdvanced { layer, .. } = event.as_ref() {
            layers.push(*layer);
        }
    }
    assert_eq!(layers, vec![1, 2, 3]);
}

#[test]
fn stalled_build_resumes_once_materials_arrive() {
    let mut world = floor();
    let mut inventory = SlotInventory::standard();
    let agent = AgentStatus::idle_at(FEET);
    let mut ctl = SessionController::new(Arc::new(BuildConfig::default()));
    ctl.build("window", column(1, "glass"), Coord::new(1, 64, 0));

    let command = expect_command(ctl.tick(&world, &mut inventory, &agent));
    assert_eq!(command.mode, GoalMode::RequestPause);
    assert_eq!(ctl.phase(), SessionPhase::Paused);
    assert_eq!(ctl.missing_report().get("glass"), Some(&1));

    // Still paused: hold position.
    let command = expect_command(ctl.tick(&world, &mut inventory, &agent));
    assert_eq!(command.mode, GoalMode::CancelAndSet);
    assert!(command.interaction.is_none());

    inventory.put(0, BlockState::new("glass"), 1);
    ctl.resume().unwrap();
    let command = expect_command(ctl.tick(&world, &mut inventory, &agent));
    assert!(matches!(
        command.interaction,
        Some(Interaction::Place { target, .. }) if target == Coord::new(1, 64, 0)
    ));
    // Protection lasts only until something is placed.
    assert!(!inventory.is_protected("glass"));
    execute(&ctl, &mut world, &mut inventory, &command);

    assert!(matches!(
        ctl.tick(&world, &mut inventory, &agent),
        TickOutcome::Finished { .. }
    ));
}

#[tokio::test]
async fn events_bracket_a_complete_build() {
    let bus = EventBus::new(64);
    let mut rx = bus.subscribe();
    let mut world = floor();
    let mut inventory = stone_inventory();
    let agent = AgentStatus::idle_at(FEET);
    let mut ctl =
        SessionController::new(Arc::new(BuildConfig::default())).with_events(bus.clone());
    ctl.build("block", column(1, "stone"), Coord::new(1, 64, 0));

    let command = expect_command(ctl.tick(&world, &mut inventory, &agent));
    execute(&ctl, &mut world, &mut inventory, &command);
    assert!(matches!(
        ctl.tick(&world, &mut inventory, &agent),
        TickOutcome::Finished { .. }
    ));
    drop(ctl);
    drop(bus);

    let mut names = Vec::new();
    while let Ok(event) = rx.recv().await {
        names.push(event.build_name().to_string());
        if matches!(event.as_ref(), BuildEvent::Finished { .. }) {
            break;
        }
    }
    assert_eq!(names, vec!["block", "block"]);
}

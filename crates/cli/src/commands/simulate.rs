//! `voxelwright simulate`: run a scene against an in-memory world.
//!
//! There is no path planner here. A toy executor stands in for one: it
//! carries out nearby interactions as given and satisfies a goal by acting
//! on the primary target directly, as if the agent had walked there.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use voxelwright_builder::{Interaction, PathingCommand, SessionController, TickOutcome};
use voxelwright_config::BuildConfig;
use voxelwright_core::{
    AgentStatus, BlockOracle, BlockState, BuildEvent, Coord, EventBus, Goal, GoalMode,
    InMemoryWorld, Inventory, SlotInventory,
};

use crate::scene::Scene;

const DEFAULT_MAX_TICKS: u32 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Finished,
    Stalled,
    OutOfTicks,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub name: String,
    pub outcome: Outcome,
    pub ticks: u32,
    pub placements: usize,
    pub breaks: usize,
    pub goals: usize,
    pub remaining_incorrect: usize,
    pub missing: BTreeMap<String, usize>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

pub async fn run(
    scene_path: &Path,
    config_path: Option<&Path>,
    max_ticks: Option<u32>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = match config_path {
        Some(path) => BuildConfig::load_from(path)?,
        None => BuildConfig::load()?,
    };
    config.validate()?;
    let scene = Scene::load(scene_path)?;
    let max_ticks = max_ticks.or(scene.max_ticks).unwrap_or(DEFAULT_MAX_TICKS);

    let (report, _world) = simulate(&scene, Arc::new(config), max_ticks, !json).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Run `scene` to completion, a stall, or `max_ticks`. Returns the report
/// and the final world.
pub async fn simulate(
    scene: &Scene,
    config: Arc<BuildConfig>,
    max_ticks: u32,
    progress: bool,
) -> Result<(SimulationReport, InMemoryWorld), Box<dyn std::error::Error>> {
    let bus = EventBus::default();
    let printer = progress.then(|| {
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => println!("  {}", describe(&event)),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Progress log fell behind");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    });

    let mut executor = ToyExecutor {
        world: scene.build_world()?,
        inventory: scene.build_inventory()?,
        agent: scene.agent(),
    };
    let mut controller = SessionController::new(config).with_events(bus);
    controller.build_from_source(scene, scene.origin)?;

    let mut report = SimulationReport {
        name: scene.name.clone(),
        outcome: Outcome::OutOfTicks,
        ticks: 0,
        placements: 0,
        breaks: 0,
        goals: 0,
        remaining_incorrect: 0,
        missing: BTreeMap::new(),
        started_at: Utc::now(),
        finished_at: Utc::now(),
    };

    for tick in 1..=max_ticks {
        report.ticks = tick;
        let outcome = controller.tick(
            &executor.world,
            &mut executor.inventory,
            &executor.agent,
        );
        match outcome {
            TickOutcome::Idle => {
                report.outcome = Outcome::Finished;
                break;
            }
            TickOutcome::Finished {
                resumed_previous, ..
            } => {
                if !resumed_previous {
                    report.outcome = Outcome::Finished;
                    break;
                }
            }
            TickOutcome::Command(command) if command.mode == GoalMode::RequestPause => {
                report.outcome = Outcome::Stalled;
                break;
            }
            TickOutcome::Command(command) => {
                if command.goal.is_some() {
                    report.goals += 1;
                }
                match executor.apply(&controller, &command) {
                    Applied::Placed => report.placements += 1,
                    Applied::Broke => report.breaks += 1,
                    Applied::Nothing => {}
                }
            }
        }
    }

    report.remaining_incorrect = controller.incorrect_count();
    report.missing = controller.missing_report().clone();
    report.finished_at = Utc::now();
    tracing::debug!(
        ticks = report.ticks,
        placements = report.placements,
        breaks = report.breaks,
        "Simulation ended"
    );

    // Dropping the controller closes the bus so the printer can finish.
    drop(controller);
    if let Some(printer) = printer {
        printer.await?;
    }
    Ok((report, executor.world))
}

enum Applied {
    Placed,
    Broke,
    Nothing,
}

struct ToyExecutor {
    world: InMemoryWorld,
    inventory: SlotInventory,
    agent: AgentStatus,
}

impl ToyExecutor {
    fn apply(&mut self, controller: &SessionController, command: &PathingCommand) -> Applied {
        if let Some(interaction) = &command.interaction {
            return match interaction {
                Interaction::Break { target } => {
                    self.world.set(*target, BlockState::air());
                    Applied::Broke
                }
                Interaction::Place { target, slot, .. } => match self.inventory.take(*slot) {
                    Some(state) => {
                        self.world.set(*target, state);
                        Applied::Placed
                    }
                    None => Applied::Nothing,
                },
            };
        }

        let Some(goal) = &command.goal else {
            return Applied::Nothing;
        };
        match primary_leaf(goal) {
            Goal::Adjacent { target, .. } | Goal::Place { target } => {
                self.place_desired(controller, *target)
            }
            // Standing on a source liquid: fill it in.
            Goal::Block { at } => self.place_desired(controller, at.below()),
            Goal::Break { target }
            | Goal::Overhead { target }
            | Goal::GetToBlock { at: target } => {
                self.world.set(*target, BlockState::air());
                Applied::Broke
            }
            Goal::Composite { .. } => Applied::Nothing,
        }
    }

    fn place_desired(&mut self, controller: &SessionController, at: Coord) -> Applied {
        let current = self.world.get(at);
        let Some(desired) = controller.desired_at(at, &current) else {
            return Applied::Nothing;
        };
        let slot = self
            .inventory
            .slots()
            .iter()
            .position(|held| held.as_ref().is_some_and(|held| held.same_block(&desired)));
        match slot.and_then(|slot| self.inventory.take(slot)) {
            Some(_) => {
                self.world.set(at, desired);
                Applied::Placed
            }
            None => Applied::Nothing,
        }
    }
}

fn primary_leaf(goal: &Goal) -> &Goal {
    match goal {
        Goal::Composite { children, .. } => children.first().map_or(goal, primary_leaf),
        leaf => leaf,
    }
}

fn describe(event: &BuildEvent) -> String {
    let (at, text) = match event {
        BuildEvent::Started {
            name,
            origin,
            nested,
            timestamp,
        } => (
            timestamp,
            format!(
                "▶ Started '{name}' at {origin}{}",
                if *nested { " (nested)" } else { "" }
            ),
        ),
        BuildEvent::LayerAdvanced {
            layer, timestamp, ..
        } => (timestamp, format!("⬆ Layer {layer}")),
        BuildEvent::LayerSkipped {
            layer, timestamp, ..
        } => (timestamp, format!("⏭ Skipped layer {layer}")),
        BuildEvent::Repeating {
            origin,
            repeat,
            timestamp,
            ..
        } => (timestamp, format!("🔁 Copy {} at {origin}", repeat + 1)),
        BuildEvent::Finished {
            name, timestamp, ..
        } => (timestamp, format!("✅ Finished '{name}'")),
        BuildEvent::Paused { timestamp, .. } => (timestamp, "⏸ Paused".to_string()),
        BuildEvent::Resumed { timestamp, .. } => (timestamp, "▶ Resumed".to_string()),
        BuildEvent::Stalled {
            layer,
            missing,
            timestamp,
            ..
        } => (
            timestamp,
            format!("⚠️  Stalled on layer {layer}; missing {}", materials(missing)),
        ),
        BuildEvent::MissingMaterials {
            missing, timestamp, ..
        } => (timestamp, format!("📦 Missing {}", materials(missing))),
    };
    format!("[{}] {text}", at.format("%H:%M:%S"))
}

fn materials(missing: &BTreeMap<String, usize>) -> String {
    if missing.is_empty() {
        return "nothing".into();
    }
    missing
        .iter()
        .map(|(name, count)| format!("{count}x {name}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_report(report: &SimulationReport) {
    let elapsed = report.finished_at - report.started_at;
    println!();
    println!("🧱 Simulation of '{}'", report.name);
    println!("==================");
    println!("  Outcome:     {:?}", report.outcome);
    println!("  Ticks:       {}", report.ticks);
    println!("  Placements:  {}", report.placements);
    println!("  Breaks:      {}", report.breaks);
    println!("  Goals:       {}", report.goals);
    println!("  Remaining:   {}", report.remaining_incorrect);
    println!("  Elapsed:     {} ms", elapsed.num_milliseconds());
    if !report.missing.is_empty() {
        println!("\n  ⚠️  Missing: {}", materials(&report.missing));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(toml: &str) -> Scene {
        Scene::from_toml(toml).unwrap()
    }

    const WALL: &str = r####"
name = "wall"
origin = [2, 64, 0]

[[world]]
from = [-8, 63, -8]
to = [8, 63, 8]
block = "dirt"

[[world]]
from = [3, 64, 0]
block = "gravel"

[[inventory]]
slot = 0
block = "stone"

[schematic]
palette = { "#" = "stone" }
layers = [["###"], ["###"]]
"####;

    #[tokio::test]
    async fn wall_is_completed() {
        let (report, world) = simulate(
            &scene(WALL),
            Arc::new(BuildConfig::default()),
            100,
            false,
        )
        .await
        .unwrap();
        assert_eq!(report.outcome, Outcome::Finished);
        assert_eq!(report.remaining_incorrect, 0);
        assert_eq!(report.breaks, 1);
        assert_eq!(report.placements, 6);
        for x in 2..5 {
            for y in 64..66 {
                assert_eq!(world.get(Coord::new(x, y, 0)), BlockState::new("stone"));
            }
        }
    }

    #[tokio::test]
    async fn missing_material_stalls() {
        let toml = WALL.replace(r#"block = "stone""#, r#"block = "dirt""#);
        let (report, _) = simulate(&scene(&toml), Arc::new(BuildConfig::default()), 100, false)
            .await
            .unwrap();
        assert_eq!(report.outcome, Outcome::Stalled);
        assert_eq!(report.missing.get("stone"), Some(&6));
    }

    #[tokio::test]
    async fn tick_budget_is_respected() {
        let (report, _) = simulate(&scene(WALL), Arc::new(BuildConfig::default()), 1, false)
            .await
            .unwrap();
        assert_eq!(report.outcome, Outcome::OutOfTicks);
        assert_eq!(report.ticks, 1);
    }

    #[test]
    fn events_are_described() {
        let event = BuildEvent::Stalled {
            name: "wall".into(),
            layer: 2,
            missing: BTreeMap::from([("glass".to_string(), 3)]),
            timestamp: Utc::now(),
        };
        let line = describe(&event);
        assert!(line.contains("layer 2"));
        assert!(line.contains("3x glass"));
    }

    #[test]
    fn report_serializes() {
        let report = SimulationReport {
            name: "wall".into(),
            outcome: Outcome::OutOfTicks,
            ticks: 3,
            placements: 1,
            breaks: 0,
            goals: 2,
            remaining_incorrect: 5,
            missing: BTreeMap::new(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcome"], "out_of_ticks");
        assert_eq!(json["remaining_incorrect"], 5);
    }
}

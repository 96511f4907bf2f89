//! Build session lifecycle: Idle → Active ⇄ Paused, with layering,
//! repeating and a single-slot snapshot for nested callers.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use voxelwright_config::BuildConfig;
use voxelwright_core::error::SessionError;
use voxelwright_core::schematic::{
    FillSchematic, LayerWindow, SelectionSchematic, SubstituteSchematic,
};
use voxelwright_core::{
    AgentStatus, BlockOracle, BlockState, BuildEvent, Coord, EventBus, Extent, Face, Goal,
    GoalMode, Inventory, Region, SchematicRef, SchematicSource,
};

use crate::BuildError;
use crate::cost::CostContext;
use crate::nearby;
use crate::reconcile::{ReconciliationEngine, ScanContext};
use crate::retry::RetryLimiter;
use crate::synth::GoalSynthesizer;
use crate::validity::is_valid;
use crate::view::SchematicView;

/// Layer advances and repeats allowed within a single tick.
pub const MAX_RECURSIONS: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Active,
    Paused,
}

/// A block interaction to perform this tick instead of pathing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Interaction {
    Break {
        target: Coord,
    },
    Place {
        target: Coord,
        against: Coord,
        face: Face,
        slot: usize,
        state: BlockState,
    },
}

/// What the planner should do this tick.
#[derive(Debug, Clone)]
pub struct PathingCommand {
    pub goal: Option<Goal>,
    pub mode: GoalMode,
    pub interaction: Option<Interaction>,
    /// Cost snapshot for searching toward `goal`.
    pub cost: Option<Arc<CostContext>>,
}

impl PathingCommand {
    fn hold(mode: GoalMode) -> Self {
        Self {
            goal: None,
            mode,
            interaction: None,
            cost: None,
        }
    }

    fn interact(interaction: Interaction) -> Self {
        Self {
            goal: None,
            mode: GoalMode::CancelAndSet,
            interaction: Some(interaction),
            cost: None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// No build is running.
    Idle,
    /// The build just completed.
    Finished {
        name: String,
        resumed_previous: bool,
    },
    Command(PathingCommand),
}

/// The state of one build. Everything here is saved by a snapshot.
#[derive(Debug, Clone)]
pub struct Session {
    name: String,
    /// The full pattern; layering windows are derived from it each tick.
    schematic: SchematicRef,
    origin: Coord,
    extent: Extent,
    paused: bool,
    layer: i32,
    repeats: u32,
    nested: bool,
    cooldown: i32,
    broke_last_tick: bool,
    approx_placeable: Vec<BlockState>,
    missing: BTreeMap<String, usize>,
    engine: ReconciliationEngine,
    stalled: Option<SessionError>,
}

impl Session {
    fn new(name: String, schematic: SchematicRef, origin: Coord, layer: i32, nested: bool) -> Self {
        let extent = schematic.extent();
        Self {
            name,
            schematic,
            origin,
            extent,
            paused: false,
            layer,
            repeats: 0,
            nested,
            cooldown: 0,
            broke_last_tick: false,
            approx_placeable: Vec::new(),
            missing: BTreeMap::new(),
            engine: ReconciliationEngine::new(),
            stalled: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schematic(&self) -> &SchematicRef {
        &self.schematic
    }

    pub fn origin(&self) -> Coord {
        self.origin
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn layer(&self) -> i32 {
        self.layer
    }

    pub fn repeats(&self) -> u32 {
        self.repeats
    }

    pub fn is_nested(&self) -> bool {
        self.nested
    }

    pub fn missing(&self) -> &BTreeMap<String, usize> {
        &self.missing
    }

    pub fn engine(&self) -> &ReconciliationEngine {
        &self.engine
    }
}

/// A saved session, restored by [`SessionController::pop_state`].
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    session: Session,
}

impl SessionSnapshot {
    pub fn session(&self) -> &Session {
        &self.session
    }
}

enum Step {
    /// Re-evaluate immediately (layer advanced or build repeated).
    Again,
    Finish,
    Done(TickOutcome),
}

/// Drives one build at a time.
#[derive(Debug)]
pub struct SessionController {
    config: Arc<BuildConfig>,
    session: Option<Session>,
    snapshot: Option<SessionSnapshot>,
    retry: RetryLimiter,
    events: Option<EventBus>,
    selections: Vec<Region>,
    /// Materials currently protected in the inventory on our behalf.
    protected: BTreeSet<String>,
    nested_finished: bool,
    missing_report: BTreeMap<String, usize>,
}

impl SessionController {
    pub fn new(config: Arc<BuildConfig>) -> Self {
        Self {
            config,
            session: None,
            snapshot: None,
            retry: RetryLimiter::new(),
            events: None,
            selections: Vec::new(),
            protected: BTreeSet::new(),
            nested_finished: false,
            missing_report: BTreeMap::new(),
        }
    }

    /// Publish lifecycle events on `bus`.
    pub fn with_events(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn config(&self) -> &Arc<BuildConfig> {
        &self.config
    }

    /// Swap the settings snapshot used from the next tick on.
    pub fn set_config(&mut self, config: Arc<BuildConfig>) {
        self.config = config;
    }

    /// Regions used to restrict loaded schematics when
    /// `build_only_selection` is set.
    pub fn set_selections(&mut self, selections: Vec<Region>) {
        self.selections = selections;
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn snapshot(&self) -> Option<&SessionSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn retry(&self) -> &RetryLimiter {
        &self.retry
    }

    pub fn phase(&self) -> SessionPhase {
        match &self.session {
            None => SessionPhase::Idle,
            Some(s) if s.paused => SessionPhase::Paused,
            Some(_) => SessionPhase::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn extent(&self) -> Option<Extent> {
        self.session.as_ref().map(|s| s.extent)
    }

    pub fn incorrect_count(&self) -> usize {
        self.session
            .as_ref()
            .map_or(0, |s| s.engine.incorrect_count())
    }

    pub fn approx_placeable(&self) -> &[BlockState] {
        self.session
            .as_ref()
            .map_or(&[], |s| s.approx_placeable.as_slice())
    }

    /// Materials the last synthesis wanted but could not find.
    pub fn missing_report(&self) -> &BTreeMap<String, usize> {
        &self.missing_report
    }

    /// Why the session paused itself, if it did.
    pub fn stall(&self) -> Option<&SessionError> {
        self.session.as_ref().and_then(|s| s.stalled.as_ref())
    }

    /// Whether the most recent nested build ran to completion.
    pub fn is_nested_finished(&self) -> bool {
        self.nested_finished
    }

    // ── Starting builds ───────────────────────────────────────────────

    pub fn build(&mut self, name: impl Into<String>, schematic: SchematicRef, origin: Coord) {
        self.start(name.into(), schematic, origin, false);
    }

    /// Start a build on behalf of an outer controller. If another build
    /// later takes over, this one is saved and restored afterwards.
    pub fn build_nested(
        &mut self,
        name: impl Into<String>,
        schematic: SchematicRef,
        origin: Coord,
    ) {
        self.start(name.into(), schematic, origin, true);
    }

    /// Load a schematic and build it. A failed load creates no session.
    pub fn build_from_source(
        &mut self,
        source: &dyn SchematicSource,
        origin: Coord,
    ) -> Result<(), BuildError> {
        let name = source.name().to_string();
        let loaded = source.load().map_err(|e| {
            warn!(build = %name, error = %e, "Schematic load failed");
            BuildError::Rejected {
                name: name.clone(),
                source: e,
            }
        })?;
        let extent = loaded.extent();
        if !extent.is_buildable() {
            return Err(BuildError::EmptyVolume { name, extent });
        }
        let restrict = self.config.build_only_selection && !self.selections.is_empty();
        let schematic: SchematicRef = if restrict {
            Arc::new(SelectionSchematic::new(loaded, origin, self.selections.clone()))
        } else {
            loaded
        };
        self.build(name, schematic, origin);
        Ok(())
    }

    /// Build "air" over the box spanned by two corners.
    pub fn clear_area(&mut self, corner1: Coord, corner2: Coord) {
        let region = Region::spanning(corner1, corner2);
        let fill = FillSchematic::new(region.extent(), BlockState::air());
        self.build("clear area", Arc::new(fill), region.min);
    }

    fn start(&mut self, name: String, schematic: SchematicRef, origin: Coord, nested: bool) {
        if self.session.as_ref().is_some_and(|s| s.nested) && self.snapshot.is_none() {
            self.push_state();
        }

        let config = Arc::clone(&self.config);
        let substitutes = &config.validity.schematic_substitutes;
        let schematic: SchematicRef = if substitutes.is_empty() {
            schematic
        } else {
            Arc::new(SubstituteSchematic::new(schematic, substitutes.clone()))
        };

        let extent = schematic.extent();
        let flips = &config.orientation;
        let origin = origin.offset(
            if flips.flip_x { extent.width } else { 0 },
            if flips.flip_y { extent.height } else { 0 },
            if flips.flip_z { extent.length } else { 0 },
        );

        info!(build = %name, origin = %origin, extent = %extent, nested, "Starting build");
        self.session = Some(Session::new(
            name.clone(),
            schematic,
            origin,
            config.start_at_layer,
            nested,
        ));
        self.retry.clear();
        self.nested_finished = false;
        self.missing_report.clear();
        self.publish(BuildEvent::Started {
            name,
            origin,
            nested,
            timestamp: Utc::now(),
        });
    }

    // ── Control ───────────────────────────────────────────────────────

    pub fn pause(&mut self) -> Result<(), SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoActiveSession)?;
        session.paused = true;
        let name = session.name.clone();
        info!(build = %name, "Build paused");
        self.publish(BuildEvent::Paused {
            name,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Restore the saved session if there is one, then unpause.
    pub fn resume(&mut self) -> Result<(), SessionError> {
        if self.snapshot.is_some() {
            self.pop_state();
        }
        let session = self.session.as_mut().ok_or(SessionError::NoActiveSession)?;
        session.paused = false;
        session.stalled = None;
        let name = session.name.clone();
        info!(build = %name, "Build resumed");
        self.publish(BuildEvent::Resumed {
            name,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Drop the current session (control was taken away). A nested session
    /// is saved first so it can be resumed.
    pub fn reset(&mut self) {
        if self.session.as_ref().is_some_and(|s| s.nested) && self.snapshot.is_none() {
            self.push_state();
        }
        self.session = None;
        self.retry.clear();
    }

    pub fn cancel(&mut self) {
        if let Some(session) = &self.session {
            info!(build = %session.name, "Build cancelled");
        }
        self.reset();
    }

    // ── Snapshot ──────────────────────────────────────────────────────

    /// Save the current session, replacing any earlier snapshot.
    pub fn push_state(&mut self) -> bool {
        let Some(session) = &self.session else {
            debug!("No build to save");
            return false;
        };
        if self.snapshot.is_some() {
            debug!("Replacing saved build state");
        }
        self.snapshot = Some(SessionSnapshot {
            session: session.clone(),
        });
        true
    }

    /// Restore the saved session. Without one this only logs.
    pub fn pop_state(&mut self) -> bool {
        match self.snapshot.take() {
            Some(snapshot) => {
                debug!(build = %snapshot.session.name, "Restored saved build state");
                self.session = Some(snapshot.session);
                true
            }
            None => {
                warn!("No saved build state to restore");
                false
            }
        }
    }

    /// Forget the snapshot. Returns whether there was one.
    pub fn clear_snapshot(&mut self) -> bool {
        self.snapshot.take().is_some()
    }

    /// Record that something was placed at `at`.
    pub fn note_insert(&mut self, at: Coord) {
        self.retry.note_insert(at);
    }

    /// The non-air state wanted at world position `at`, if the active build
    /// governs it.
    pub fn desired_at(&self, at: Coord, current: &BlockState) -> Option<BlockState> {
        let session = self.session.as_ref()?;
        let rel = at - session.origin;
        if !session.extent.contains(rel) || !session.schematic.in_domain(rel, current) {
            return None;
        }
        let state = session
            .schematic
            .desired(rel, current, &session.approx_placeable);
        (!state.is_air()).then_some(state)
    }

    // ── Tick ──────────────────────────────────────────────────────────

    /// Evaluate one scheduling tick.
    pub fn tick(
        &mut self,
        world: &dyn BlockOracle,
        inventory: &mut dyn Inventory,
        agent: &AgentStatus,
    ) -> TickOutcome {
        let cooldown_ticks = self.config.planner.place_cooldown_ticks;
        let Some(session) = self.session.as_mut() else {
            release_protected(&mut self.protected, inventory);
            return TickOutcome::Idle;
        };

        for name in session.missing.keys() {
            self.protected.insert(name.clone());
            if !inventory.is_protected(name) {
                inventory.protect(name);
            }
        }

        let slots = inventory.slots();
        session.approx_placeable = slots
            .iter()
            .map(|slot| slot.clone().unwrap_or_else(BlockState::air))
            .collect();

        if session.broke_last_tick {
            session.cooldown = cooldown_ticks;
            session.broke_last_tick = false;
        } else {
            session.cooldown = session.cooldown.saturating_sub(1);
        }

        for _ in 0..=MAX_RECURSIONS {
            match self.step(world, inventory, agent, &slots) {
                Step::Again => continue,
                Step::Finish => return self.finish(inventory),
                Step::Done(outcome) => return outcome,
            }
        }
        warn!("Too many layer advances in one tick");
        TickOutcome::Command(PathingCommand::hold(GoalMode::SetAndPath))
    }

    fn step(
        &mut self,
        world: &dyn BlockOracle,
        inventory: &mut dyn Inventory,
        agent: &AgentStatus,
        slots: &[Option<BlockState>],
    ) -> Step {
        let config = Arc::clone(&self.config);
        let Self {
            session,
            retry,
            events,
            protected,
            missing_report,
            ..
        } = self;
        let Some(session) = session.as_mut() else {
            return Step::Done(TickOutcome::Idle);
        };
        // A paused session does not rescan; the incorrect set is stale
        // until the first tick after resume.
        if session.paused {
            return Step::Done(TickOutcome::Command(PathingCommand::hold(
                GoalMode::CancelAndSet,
            )));
        }

        let layering = config.layering();
        let layer_height = config.layers.height;
        let active: SchematicRef = if layering {
            Arc::new(LayerWindow::for_layer(
                Arc::clone(&session.schematic),
                session.layer,
                layer_height,
                config.layers.top_down,
            ))
        } else {
            Arc::clone(&session.schematic)
        };
        let view = SchematicView::new(active, session.origin, session.approx_placeable.clone());
        let ctx = ScanContext::new(&view, world, retry, &config);

        if !session.engine.refresh(&ctx, agent.feet) {
            if layering && session.layer * layer_height < session.extent.height {
                session.layer += 1;
                info!(build = %session.name, layer = session.layer, "Starting layer");
                publish(events, BuildEvent::LayerAdvanced {
                    name: session.name.clone(),
                    layer: session.layer,
                    timestamp: Utc::now(),
                });
                return Step::Again;
            }

            session.repeats += 1;
            let repeat = &config.repeat;
            let out_of_repeats =
                u32::try_from(repeat.count).is_ok_and(|max| session.repeats >= max);
            if repeat.vector.is_zero() || out_of_repeats {
                return Step::Finish;
            }
            session.layer = 0;
            session.origin = session.origin + repeat.vector;
            if !repeat.sneaky {
                session.schematic.reset();
            }
            session.engine.invalidate();
            info!(
                build = %session.name,
                vector = %repeat.vector,
                origin = %session.origin,
                "Repeating build"
            );
            publish(events, BuildEvent::Repeating {
                name: session.name.clone(),
                origin: session.origin,
                repeat: session.repeats,
                timestamp: Utc::now(),
            });
            return Step::Again;
        }

        let to_break = if agent.can_interact() {
            nearby::find_break(&ctx, agent)
        } else {
            None
        };
        if let Some(target) = to_break {
            retry.note_break(target);
            session.broke_last_tick = true;
            debug!(target = %target, "Breaking nearby block");
            return Step::Done(TickOutcome::Command(PathingCommand::interact(
                Interaction::Break { target },
            )));
        }

        let priority = inventory.priority_slot_count();
        let mut desirable = Vec::new();
        let placement = nearby::find_placement(&ctx, agent, slots, priority, &mut desirable);
        if let Some(placement) = placement.filter(|_| agent.can_interact() && session.cooldown <= 0)
        {
            retry.note_insert(placement.target);
            release_protected(protected, inventory);
            debug!(target = %placement.target, block = %placement.state, "Placing nearby block");
            return Step::Done(TickOutcome::Command(PathingCommand::interact(
                Interaction::Place {
                    target: placement.target,
                    against: placement.against,
                    face: placement.face,
                    slot: placement.slot,
                    state: placement.state,
                },
            )));
        }

        if config.inventory.allow_inventory && !agent.interactions_paused {
            stage_inventory(&config, inventory, slots, priority, &desirable);
        }

        let incorrect = session.engine.incorrect().cloned().unwrap_or_default();
        let synth = GoalSynthesizer::new(ctx, agent);
        let hotbar_len = priority.min(session.approx_placeable.len());
        let mut synthesis = synth.assemble(
            &incorrect,
            &session.approx_placeable[..hotbar_len],
            false,
        );
        if synthesis.goal.is_none() {
            // Far from the work: assume the whole inventory is reachable.
            synthesis = synth.assemble(&incorrect, &session.approx_placeable, true);
        }
        for at in &synthesis.fallback_places {
            retry.note_insert(*at);
        }

        if synthesis.missing != session.missing && !synthesis.missing.is_empty() {
            publish(events, BuildEvent::MissingMaterials {
                name: session.name.clone(),
                missing: synthesis.missing.clone(),
                timestamp: Utc::now(),
            });
        }
        session.missing = synthesis.missing.clone();
        *missing_report = synthesis.missing;

        let Some(goal) = synthesis.goal else {
            if config.skip_failed_layers
                && layering
                && session.layer * layer_height < session.extent.height
            {
                warn!(
                    build = %session.name,
                    layer = session.layer,
                    "Skipping layer that cannot be built"
                );
                publish(events, BuildEvent::LayerSkipped {
                    name: session.name.clone(),
                    layer: session.layer,
                    timestamp: Utc::now(),
                });
                session.layer += 1;
                return Step::Again;
            }
            let error = SessionError::Stalled {
                layer: session.layer,
                missing: session.missing.clone(),
            };
            warn!(build = %session.name, "{error}; pausing until resumed");
            session.paused = true;
            session.stalled = Some(error);
            publish(events, BuildEvent::Stalled {
                name: session.name.clone(),
                layer: session.layer,
                missing: session.missing.clone(),
                timestamp: Utc::now(),
            });
            return Step::Done(TickOutcome::Command(PathingCommand::hold(
                GoalMode::RequestPause,
            )));
        };

        let hotbar: Vec<BlockState> = slots.iter().take(priority).flatten().cloned().collect();
        let has_throwaway = hotbar.iter().any(|held| {
            config
                .inventory
                .throwaway_materials
                .iter()
                .any(|name| name == held.name())
                && !inventory.is_protected(held.name())
        });
        debug!(
            incorrect = incorrect.len(),
            place_goals = synthesis.place_goals,
            break_goals = synthesis.break_goals,
            "Handing goal to planner"
        );
        let cost = CostContext::new(view, hotbar, has_throwaway, &config);
        Step::Done(TickOutcome::Command(PathingCommand {
            goal: Some(goal),
            mode: GoalMode::ForceRevalidate,
            interaction: None,
            cost: Some(Arc::new(cost)),
        }))
    }

    fn finish(&mut self, inventory: &mut dyn Inventory) -> TickOutcome {
        let Some(done) = self.session.take() else {
            return TickOutcome::Idle;
        };
        info!(build = %done.name, repeats = done.repeats, "Done building");
        if done.nested {
            self.nested_finished = true;
        }
        self.retry.clear();
        release_protected(&mut self.protected, inventory);

        let resumed_previous = match self.snapshot.take() {
            Some(snapshot) => {
                info!(build = %snapshot.session.name, "Resuming saved build");
                self.session = Some(snapshot.session);
                true
            }
            None => false,
        };
        self.publish(BuildEvent::Finished {
            name: done.name.clone(),
            resumed_previous,
            timestamp: Utc::now(),
        });
        TickOutcome::Finished {
            name: done.name,
            resumed_previous,
        }
    }

    fn publish(&self, event: BuildEvent) {
        publish(&self.events, event);
    }
}

fn publish(events: &Option<EventBus>, event: BuildEvent) {
    if let Some(bus) = events {
        bus.publish(event);
    }
}

fn release_protected(protected: &mut BTreeSet<String>, inventory: &mut dyn Inventory) {
    for name in std::mem::take(protected) {
        inventory.release(&name);
    }
}

/// Move a wanted material that is only held outside the priority slots
/// into one, without displacing slots that already serve a wanted block.
fn stage_inventory(
    config: &BuildConfig,
    inventory: &mut dyn Inventory,
    slots: &[Option<BlockState>],
    priority: usize,
    desirable: &[BlockState],
) {
    let fits = |held: Option<&BlockState>, desired: &BlockState| {
        held.is_some_and(|held| is_valid(&config.validity, held, Some(desired), true))
    };
    let hotbar = priority.min(slots.len());

    let mut useful = Vec::new();
    let mut unserved = Vec::new();
    for desired in desirable {
        match (0..hotbar).find(|i| fits(slots[*i].as_ref(), desired)) {
            Some(i) => useful.push(i),
            None => unserved.push(desired),
        }
    }

    for (slot, held) in slots.iter().enumerate().skip(hotbar) {
        if unserved.iter().any(|desired| fits(held.as_ref(), desired)) {
            if inventory.swap_into_priority(slot, &useful) {
                debug!(slot, "Moved wanted material into a priority slot");
            }
            break;
        }
    }
}

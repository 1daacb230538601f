use super::state::{
    BottleState, Container, LabEvent, LabState, Notice, NoticeLevel, ResolutionState,
};
use crate::{
    catalog::SubstanceCatalog,
    config::LabConfig,
    effects::{ActiveEffect, EffectDispatcher},
    error::LabError,
    logger::TimeSeriesLogger,
    persistence::{LabSnapshot, SCHEMA_VERSION},
    properties::{self, mixture_color},
    resolver::{
        remote::InferenceClient, ReactionResolver, Resolution, ResolutionReport, ResolutionRequest,
    },
    safety::{self, SafetyMonitor},
    scoring::{self, Scoreboard},
};
use chrono::Utc;
use labforge_schemas::{
    chemical::{sanitize_volume, BottleChemical, ChemicalQuantity},
    command::LabCommand,
    equipment::{EquipmentKind, Position},
    reaction::{ColorChange, ReactionOutcome, ReactionRecord},
    safety::SafetyAlert,
    session::{ExperimentState, ExperimentStatus},
};
use std::collections::VecDeque;

/// Reaction heat is capped so a single outcome cannot boil the bench.
const MAX_REACTION_HEAT: f64 = 80.0;
const HEAT_PER_ENERGY: f64 = 0.5;
const REACTIONS_FOR_MASTER_BADGE: usize = 5;

pub struct LabEngine {
    pub(super) state: LabState,
    pub(super) config: LabConfig,
    pub(super) catalog: SubstanceCatalog,
    pub(super) safety: SafetyMonitor,
    pub(super) effects: EffectDispatcher,
    pub(super) scoreboard: Scoreboard,
    pub(super) logger: Option<TimeSeriesLogger>,
    pub(super) pending: VecDeque<ResolutionRequest>,
    pub(super) next_ticket: u64,
    pub(super) next_container: u64,
    pub(super) user_id: Option<String>,
    pub(super) last_auto_save: u64,
    pub(super) selected_bottle: Option<String>,
}

impl LabEngine {
    /// Applies one scripted command. Returns the id of a placed container.
    pub fn execute(&mut self, command: LabCommand) -> Result<Option<String>, LabError> {
        let mut placed = None;
        match command {
            LabCommand::StartExperiment => self.start_experiment()?,
            LabCommand::PauseExperiment => self.pause_experiment()?,
            LabCommand::ResumeExperiment => self.resume_experiment()?,
            LabCommand::CompleteExperiment => self.complete_experiment()?,
            LabCommand::ResetLab => self.reset(),
            LabCommand::Place {
                equipment,
                position,
                substance,
                label: _,
            } => {
                let kind = EquipmentKind::from_catalog_id(&equipment)
                    .ok_or_else(|| LabError::UnknownEquipment(equipment.clone()));
                let kind = self.record(kind)?;
                let chemical = match substance {
                    Some(name) => {
                        let found = self
                            .catalog
                            .get(&name)
                            .map(BottleChemical::from)
                            .ok_or(LabError::UnknownSubstance(name));
                        Some(self.record(found)?)
                    }
                    None => None,
                };
                placed = Some(self.place(kind, position, chemical)?);
            }
            LabCommand::Move {
                container,
                position,
            } => self.move_container(&container, position)?,
            LabCommand::Remove { container } => self.remove(&container)?,
            LabCommand::AddChemical {
                container,
                substance,
                volume_ml,
            } => self.add_chemical(&container, &substance, volume_ml)?,
            LabCommand::Pour {
                bottle,
                target,
                amount_ml,
            } => self.pour(&bottle, &target, amount_ml)?,
            LabCommand::QuickPour {
                bottle,
                target,
                amount,
            } => self.quick_pour(&bottle, &target, amount)?,
            LabCommand::SelectBottle { bottle } => self.select_bottle(&bottle)?,
            LabCommand::SetVolume {
                container,
                volume_ml,
            } => self.set_volume(&container, volume_ml)?,
            LabCommand::SetHeated { container, heated } => self.set_heated(&container, heated)?,
            LabCommand::Wait { seconds } => self.advance(seconds)?,
            LabCommand::ClearAlerts => self.clear_alerts(),
        }
        self.log("command")?;
        Ok(placed)
    }

    // --- session -------------------------------------------------------

    pub fn start_experiment(&mut self) -> Result<(), LabError> {
        let status = self.state.experiment.status;
        let result = match status {
            ExperimentStatus::Active => return Ok(()),
            ExperimentStatus::Paused => Err(LabError::IllegalTransition {
                action: "start",
                status,
            }),
            ExperimentStatus::Idle | ExperimentStatus::Completed => Ok(()),
        };
        self.record(result)?;

        let now = Utc::now();
        let session = format!("exp-{}", now.timestamp_millis());
        self.state.experiment = ExperimentState {
            status: ExperimentStatus::Active,
            start_time: Some(now),
            current_session: Some(session.clone()),
            auto_save_enabled: self.state.experiment.auto_save_enabled,
            end_time: None,
        };
        self.last_auto_save = self.state.tick;
        self.scoreboard.award(scoring::POINTS_START);
        println!("--- Experiment started: {} ---", session);
        self.notify(
            NoticeLevel::Info,
            "Experiment Started",
            "You can now place equipment and pour chemicals.".to_string(),
        );
        self.touch();
        Ok(())
    }

    pub fn pause_experiment(&mut self) -> Result<(), LabError> {
        self.transition("pause", &[ExperimentStatus::Active], ExperimentStatus::Paused)?;
        println!("--- Experiment paused ---");
        Ok(())
    }

    pub fn resume_experiment(&mut self) -> Result<(), LabError> {
        self.transition("resume", &[ExperimentStatus::Paused], ExperimentStatus::Active)?;
        println!("--- Experiment resumed ---");
        Ok(())
    }

    pub fn complete_experiment(&mut self) -> Result<(), LabError> {
        self.transition(
            "complete",
            &[ExperimentStatus::Active, ExperimentStatus::Paused],
            ExperimentStatus::Completed,
        )?;
        self.state.experiment.end_time = Some(Utc::now());
        println!("--- Experiment completed ---");
        Ok(())
    }

    fn transition(
        &mut self,
        action: &'static str,
        from: &[ExperimentStatus],
        to: ExperimentStatus,
    ) -> Result<(), LabError> {
        let status = self.state.experiment.status;
        let result = if from.contains(&status) {
            Ok(())
        } else {
            Err(LabError::IllegalTransition { action, status })
        };
        self.record(result)?;
        self.state.experiment.status = to;
        self.touch();
        Ok(())
    }

    /// Clears the bench, the history, the alerts and the score.
    pub fn reset(&mut self) {
        let tick = self.state.tick;
        self.state = LabState {
            tick,
            revision: self.state.revision,
            ..LabState::default()
        };
        self.pending.clear();
        self.effects.clear();
        self.scoreboard.reset();
        self.selected_bottle = None;
        self.last_auto_save = tick;
        println!("--- Lab reset ---");
        self.notify(
            NoticeLevel::Info,
            "Lab Reset",
            "All equipment, reactions and alerts were cleared.".to_string(),
        );
        self.touch();
    }

    pub fn set_auto_save(&mut self, enabled: bool) {
        self.state.experiment.auto_save_enabled = enabled;
        self.touch();
    }

    // --- container store -----------------------------------------------

    /// Places a piece of equipment. Bottles need `chemical` and start full.
    pub fn place(
        &mut self,
        kind: EquipmentKind,
        position: Position,
        chemical: Option<BottleChemical>,
    ) -> Result<String, LabError> {
        let result = self.try_place(kind, position, chemical);
        self.record(result)
    }

    fn try_place(
        &mut self,
        kind: EquipmentKind,
        position: Position,
        chemical: Option<BottleChemical>,
    ) -> Result<String, LabError> {
        self.require_active()?;
        let bottle = if kind.is_bottle() {
            let chemical = chemical.ok_or_else(|| LabError::MissingBottleChemical(kind.to_string()))?;
            Some(BottleState::full(chemical, self.config.bottle_capacity_ml))
        } else {
            None
        };
        self.check_position(position, None)?;

        let id = self.fresh_container_id(kind);
        let mut container = Container::new(id.clone(), kind, position);
        container.bottle = bottle;
        container.sync_bottle();
        properties::derive(&mut container, &self.catalog, &self.config);
        self.state.containers.push(container);

        self.scoreboard.award(scoring::POINTS_PLACE);
        self.state.events.push(LabEvent::Placed {
            id: id.clone(),
            kind,
        });
        self.touch();
        Ok(id)
    }

    fn fresh_container_id(&mut self, kind: EquipmentKind) -> String {
        loop {
            self.next_container += 1;
            let id = format!("{}-{}", kind, self.next_container);
            if self.state.container(&id).is_none() {
                return id;
            }
        }
    }

    pub fn move_container(&mut self, id: &str, position: Position) -> Result<(), LabError> {
        let result = self.try_move(id, position);
        self.record(result)
    }

    fn try_move(&mut self, id: &str, position: Position) -> Result<(), LabError> {
        self.require_active()?;
        let index = self.index_of(id)?;
        self.check_position(position, Some(id))?;
        self.state.containers[index].position = position;
        self.state.events.push(LabEvent::Moved { id: id.to_string() });
        self.touch();
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Result<(), LabError> {
        let result = self.try_remove(id);
        self.record(result)
    }

    fn try_remove(&mut self, id: &str) -> Result<(), LabError> {
        self.require_active()?;
        let index = self.index_of(id)?;
        self.state.containers.remove(index);
        self.effects.forget_container(id);
        if self.selected_bottle.as_deref() == Some(id) {
            self.selected_bottle = None;
        }
        self.state.events.push(LabEvent::Removed { id: id.to_string() });
        self.touch();
        Ok(())
    }

    /// Adds `volume` mL of a substance to a non-bottle container.
    pub fn add_chemical(&mut self, id: &str, substance: &str, volume: f64) -> Result<(), LabError> {
        let result = self.try_add_chemical(id, substance, volume);
        self.record(result)
    }

    fn try_add_chemical(&mut self, id: &str, substance: &str, volume: f64) -> Result<(), LabError> {
        self.require_active()?;
        let index = self.index_of(id)?;
        if self.state.containers[index].is_bottle() {
            return Err(LabError::InvalidTarget(id.to_string()));
        }
        if !(volume.is_finite() && volume > 0.0) {
            return Err(LabError::InvalidAmount(volume));
        }
        let (name, color) = match self.catalog.get(substance) {
            Some(s) => (s.name.clone(), s.color.clone()),
            None => (substance.trim().to_string(), self.catalog.color_for(substance)),
        };
        self.deliver(index, ChemicalQuantity::new(name, volume, color));
        self.touch();
        Ok(())
    }

    /// Rescales every quantity so the contents sum to `new_total`.
    pub fn set_volume(&mut self, id: &str, new_total: f64) -> Result<(), LabError> {
        let result = self.try_set_volume(id, new_total);
        self.record(result)
    }

    fn try_set_volume(&mut self, id: &str, new_total: f64) -> Result<(), LabError> {
        self.require_active()?;
        let index = self.index_of(id)?;
        let container = &self.state.containers[index];
        if container.is_bottle() {
            return Err(LabError::InvalidTarget(id.to_string()));
        }
        if container.contents.is_empty() {
            return Err(LabError::EmptyContainer(id.to_string()));
        }
        if !(new_total.is_finite() && new_total >= 0.0) {
            return Err(LabError::InvalidAmount(new_total));
        }
        self.state.containers[index].rescale_to(new_total);
        self.refresh(index);
        self.state.events.push(LabEvent::VolumeAdjusted {
            container_id: id.to_string(),
            volume: self.state.containers[index].total_volume,
        });
        self.touch();
        Ok(())
    }

    pub fn set_heated(&mut self, id: &str, heated: bool) -> Result<(), LabError> {
        let result = self.try_set_heated(id, heated);
        self.record(result)
    }

    fn try_set_heated(&mut self, id: &str, heated: bool) -> Result<(), LabError> {
        self.require_active()?;
        let index = self.index_of(id)?;
        if !self.state.containers[index].kind.can_be_heated() {
            return Err(LabError::InvalidTarget(id.to_string()));
        }
        self.state.containers[index].is_heated = heated;
        self.refresh(index);
        self.touch();
        Ok(())
    }

    pub fn clear_alerts(&mut self) {
        self.state.alerts.clear();
        self.touch();
    }

    /// Routes a quantity into a container, queueing it behind an in-flight
    /// resolution if there is one.
    pub(super) fn deliver(&mut self, index: usize, quantity: ChemicalQuantity) {
        let container = &mut self.state.containers[index];
        if container.resolution.is_resolving() {
            self.state.events.push(LabEvent::DeliveryQueued {
                container_id: container.id.clone(),
                name: quantity.name.clone(),
                volume: quantity.volume,
            });
            container.pending_deliveries.push_back(quantity);
            return;
        }
        self.land(index, quantity);
    }

    fn land(&mut self, index: usize, quantity: ChemicalQuantity) {
        let container = &mut self.state.containers[index];
        self.state.events.push(LabEvent::ChemicalAdded {
            container_id: container.id.clone(),
            name: quantity.name.clone(),
            volume: quantity.volume,
        });
        container.contents.push(quantity);
        container.recompute_total();
        self.refresh(index);
        self.queue_resolution(index);
    }

    fn drain_deliveries(&mut self, index: usize) {
        while !self.state.containers[index].resolution.is_resolving() {
            let Some(quantity) = self.state.containers[index].pending_deliveries.pop_front() else {
                break;
            };
            self.land(index, quantity);
        }
    }

    // --- reaction resolution -------------------------------------------

    /// Queues a check of the two most recent quantities, unless one is in
    /// flight already or both are the same substance.
    fn queue_resolution(&mut self, index: usize) {
        let container = &self.state.containers[index];
        let count = container.contents.len();
        if container.resolution.is_resolving() || count < 2 {
            return;
        }
        let chemical_a = container.contents[count - 2].clone();
        let chemical_b = container.contents[count - 1].clone();
        if chemical_a.name.eq_ignore_ascii_case(&chemical_b.name) {
            return;
        }

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let request = ResolutionRequest {
            ticket,
            container_id: container.id.clone(),
            identifier_a: self.catalog.identifier(&chemical_a.name),
            identifier_b: self.catalog.identifier(&chemical_b.name),
            chemical_a,
            chemical_b,
            temperature: container.temperature,
        };
        self.state.events.push(LabEvent::ResolutionQueued {
            container_id: request.container_id.clone(),
            ticket,
        });
        self.pending.push_back(request);
        self.state.containers[index].resolution = ResolutionState::Resolving { ticket };
        self.refresh(index);
    }

    pub fn pending_resolutions(&self) -> usize {
        self.pending.len()
    }

    /// Pops the oldest request whose container is still waiting for it.
    pub fn next_resolution_request(&mut self) -> Option<ResolutionRequest> {
        while let Some(request) = self.pending.pop_front() {
            let waiting = self
                .state
                .container(&request.container_id)
                .is_some_and(|c| c.resolution == ResolutionState::Resolving { ticket: request.ticket });
            if waiting {
                return Some(request);
            }
            self.state.events.push(LabEvent::ResolutionDiscarded {
                container_id: request.container_id,
                ticket: request.ticket,
            });
        }
        None
    }

    /// Resolves every queued request in order, including the ones queued
    /// by deliveries drained along the way. Returns how many were applied.
    pub fn run_pending_resolutions<C: InferenceClient>(&mut self, resolver: &ReactionResolver<C>) -> usize {
        let mut applied = 0;
        while let Some(request) = self.next_resolution_request() {
            let report = resolver.resolve(&request);
            if self.apply_resolution(report) {
                applied += 1;
            }
        }
        applied
    }

    /// Applies a finished resolution. Reports for removed containers or
    /// superseded tickets are dropped and `false` is returned.
    pub fn apply_resolution(&mut self, report: ResolutionReport) -> bool {
        let index = match self.state.container_index(&report.container_id) {
            Some(index)
                if self.state.containers[index].resolution
                    == (ResolutionState::Resolving {
                        ticket: report.ticket,
                    }) =>
            {
                index
            }
            _ => {
                self.state.events.push(LabEvent::ResolutionDiscarded {
                    container_id: report.container_id,
                    ticket: report.ticket,
                });
                return false;
            }
        };

        match report.resolution {
            Resolution::Reacted(outcome) => self.apply_outcome(index, outcome),
            Resolution::NoReaction => {
                let container = &mut self.state.containers[index];
                container.resolution = ResolutionState::Idle;
                self.state.events.push(LabEvent::NoReaction {
                    container_id: container.id.clone(),
                });
                self.refresh(index);
                self.notify(
                    NoticeLevel::Info,
                    "No Reaction",
                    "These chemicals do not react under the current conditions.".to_string(),
                );
            }
        }
        self.drain_deliveries(index);
        self.touch();
        true
    }

    fn apply_outcome(&mut self, index: usize, mut outcome: ReactionOutcome) {
        let tick = self.state.tick;
        let container = &self.state.containers[index];
        let container_id = container.id.clone();
        let descriptors: Vec<String> = container
            .contents
            .iter()
            .map(|c| self.catalog.descriptor(&c.name))
            .collect();
        let color_before = mixture_color(&container.contents);
        let baseline = properties::temperature(
            &Container {
                reaction_heat: 0.0,
                ..container.clone()
            },
            &self.config,
        );

        let reaction_heat = match outcome.final_temperature {
            Some(final_temperature) => (final_temperature - baseline).clamp(0.0, MAX_REACTION_HEAT),
            None => (outcome.energy * HEAT_PER_ENERGY).clamp(0.0, MAX_REACTION_HEAT),
        };

        if outcome.color_change.is_none() {
            if let Some(final_color) = &outcome.final_color {
                if !final_color.eq_ignore_ascii_case(&color_before) {
                    outcome.color_change = Some(ColorChange {
                        from: color_before,
                        to: final_color.clone(),
                    });
                }
            }
        }

        let mut alerts = self.safety.check(&descriptors, baseline + reaction_heat);
        alerts.extend(safety::alert_from_outcome(&outcome));
        for alert in alerts {
            self.raise_alert(alert);
        }

        let container = &mut self.state.containers[index];
        if let Some(name) = &outcome.output_chemical {
            let color = outcome
                .final_color
                .clone()
                .unwrap_or_else(|| self.catalog.color_for(name));
            container.contents = vec![ChemicalQuantity::new(
                name.clone(),
                sanitize_volume(outcome.output_volume),
                color,
            )];
            container.recompute_total();
        }
        container.reaction_heat = reaction_heat;
        container.reaction_type = Some(outcome.reaction_name.clone());
        container.reaction_progress = 1.0;
        container.resolution = ResolutionState::Applied {
            reaction_index: self.state.reactions.len(),
        };
        self.refresh(index);

        self.effects.dispatch(&container_id, &outcome, tick);

        println!(
            "[Reaction] {} in {} ({:?})",
            outcome.reaction_name, container_id, outcome.source
        );
        let message = if outcome.description.is_empty() {
            outcome.reaction_name.clone()
        } else {
            format!("{}: {}", outcome.reaction_name, outcome.description)
        };
        self.state.events.push(LabEvent::ReactionApplied {
            container_id: container_id.clone(),
            reaction_name: outcome.reaction_name.clone(),
        });
        self.state.reactions.push(ReactionRecord {
            equipment_id: container_id,
            outcome,
            tick,
            started_at: Utc::now(),
        });

        self.scoreboard.award(scoring::POINTS_REACTION);
        self.scoreboard.award_badge(scoring::BADGE_FIRST_REACTION);
        if self.state.reactions.len() >= REACTIONS_FOR_MASTER_BADGE {
            self.scoreboard.award_badge(scoring::BADGE_FIVE_REACTIONS);
        }
        self.notify(NoticeLevel::Info, "Reaction Detected!", message);
    }

    fn raise_alert(&mut self, alert: SafetyAlert) {
        eprintln!("[Safety] {:?}: {} ({})", alert.level, alert.message, alert.action);
        self.state.events.push(LabEvent::AlertRaised {
            level: format!("{:?}", alert.level).to_lowercase(),
            message: alert.message.clone(),
        });
        self.state.alerts.push(alert);
    }

    // --- time ----------------------------------------------------------

    /// Advances the bench clock by one second.
    pub fn tick(&mut self) -> Result<(), LabError> {
        self.state.tick += 1;
        let tick = self.state.tick;
        let rate = self.config.evaporation_rate_ml_per_sec;
        let cooling = self.config.cooling_rate_per_sec;
        let cooldown = self.config.refill_cooldown_secs;
        let mut changed = false;

        for container in &mut self.state.containers {
            if container.is_heated && !container.is_bottle() && container.total_volume > 0.0 {
                changed = true;
                let before = container.total_volume;
                container.rescale_to((before - rate).max(0.0));
                self.state.events.push(LabEvent::Evaporated {
                    container_id: container.id.clone(),
                    amount: before - container.total_volume,
                });
            }
            if container.reaction_heat > 0.0 {
                changed = true;
                container.reaction_heat = (container.reaction_heat - cooling).max(0.0);
            }
            if let Some(bottle) = &mut container.bottle {
                let due = bottle
                    .emptied_at
                    .is_some_and(|emptied| tick >= emptied.saturating_add(cooldown));
                if bottle.is_empty() && due {
                    changed = true;
                    bottle.volume_remaining = bottle.max_volume;
                    bottle.emptied_at = None;
                    bottle.refill_count += 1;
                    self.state.events.push(LabEvent::BottleRefilled {
                        bottle_id: container.id.clone(),
                    });
                }
            }
            container.sync_bottle();
        }
        for index in 0..self.state.containers.len() {
            self.refresh(index);
        }
        // Evaporation, cooling and refills all count as bench changes.
        if changed {
            self.touch();
        }
        self.effects.expire(tick);
        self.log("tick")
    }

    pub fn advance(&mut self, seconds: u64) -> Result<(), LabError> {
        for _ in 0..seconds {
            self.tick()?;
        }
        Ok(())
    }

    /// True when the periodic experiment summary upload is due.
    pub fn auto_save_due(&self) -> bool {
        self.state.experiment.is_active()
            && self.state.experiment.auto_save_enabled
            && self.user_id.as_deref().is_some_and(|id| !id.trim().is_empty())
            && self.state.tick >= self.last_auto_save.saturating_add(self.config.auto_save_interval_secs)
    }

    pub fn mark_auto_saved(&mut self) {
        self.last_auto_save = self.state.tick;
    }

    // --- snapshot ------------------------------------------------------

    pub fn snapshot(&self) -> LabSnapshot {
        LabSnapshot {
            schema_version: SCHEMA_VERSION,
            placed_equipment: self.state.containers.clone(),
            reactions: self.state.reactions.clone(),
            experiment_state: self.state.experiment.clone(),
            is_experiment_started: self.state.experiment.is_active(),
            score: self.scoreboard.score(),
            badges: self.scoreboard.badges().to_vec(),
            safety_alerts: self.state.alerts.clone(),
        }
    }

    /// Replaces the bench with a loaded snapshot. Deliveries that were
    /// queued when it was taken land immediately; nothing stays resolving.
    pub fn restore(&mut self, snapshot: LabSnapshot) {
        let tick = self.state.tick;
        let reactions = snapshot.reactions;
        let mut containers = snapshot.placed_equipment;
        for container in &mut containers {
            for quantity in &mut container.contents {
                quantity.volume = sanitize_volume(quantity.volume);
            }
            let queued: Vec<_> = container.pending_deliveries.drain(..).collect();
            container.contents.extend(queued);
            if let Some(bottle) = &mut container.bottle {
                bottle.max_volume = sanitize_volume(bottle.max_volume);
                bottle.volume_remaining = sanitize_volume(bottle.volume_remaining).min(bottle.max_volume);
                bottle.emptied_at = bottle.is_empty().then_some(tick);
            }
            container.sync_bottle();
            container.recompute_total();
            container.reaction_heat = sanitize_volume(container.reaction_heat);
            container.resolution = match reactions
                .iter()
                .rposition(|r| r.equipment_id == container.id)
            {
                Some(reaction_index)
                    if container.reaction_type.as_deref()
                        == Some(reactions[reaction_index].outcome.reaction_name.as_str()) =>
                {
                    ResolutionState::Applied { reaction_index }
                }
                _ => ResolutionState::Idle,
            };
            properties::derive(container, &self.catalog, &self.config);
        }

        self.state = LabState {
            tick,
            containers,
            reactions,
            alerts: snapshot.safety_alerts,
            experiment: snapshot.experiment_state,
            events: Vec::new(),
            notices: Vec::new(),
            revision: self.state.revision + 1,
        };
        self.scoreboard = Scoreboard::restore(snapshot.score, snapshot.badges);
        self.pending.clear();
        self.effects.clear();
        self.selected_bottle = None;
        self.last_auto_save = tick;
    }

    // --- helpers -------------------------------------------------------

    pub(super) fn require_active(&self) -> Result<(), LabError> {
        if self.state.experiment.is_active() {
            Ok(())
        } else {
            Err(LabError::SessionInactive(self.state.experiment.status))
        }
    }

    pub(super) fn index_of(&self, id: &str) -> Result<usize, LabError> {
        self.state
            .container_index(id)
            .ok_or_else(|| LabError::ContainerNotFound(id.to_string()))
    }

    fn check_position(&self, position: Position, ignore: Option<&str>) -> Result<(), LabError> {
        let [x, _, z] = position;
        let inside = x.is_finite()
            && z.is_finite()
            && x.abs() <= self.config.bench_half_width
            && z.abs() <= self.config.bench_half_depth;
        if !inside {
            return Err(LabError::OutOfBounds { x, z });
        }
        for other in &self.state.containers {
            if Some(other.id.as_str()) == ignore {
                continue;
            }
            let dx = other.position[0] - x;
            let dz = other.position[2] - z;
            if (dx * dx + dz * dz).sqrt() < self.config.min_spacing {
                return Err(LabError::PositionOccupied(other.id.clone()));
            }
        }
        Ok(())
    }

    pub(super) fn refresh(&mut self, index: usize) {
        properties::derive(&mut self.state.containers[index], &self.catalog, &self.config);
    }

    /// Marks a successful mutation.
    pub(super) fn touch(&mut self) {
        self.state.revision += 1;
    }

    /// Turns a rejection into an error notice and passes the result on.
    pub(super) fn record<T>(&mut self, result: Result<T, LabError>) -> Result<T, LabError> {
        if let Err(err) = &result {
            if err.is_rejection() {
                self.notify(NoticeLevel::Error, err.notice_title(), err.to_string());
            }
        }
        result
    }

    pub(super) fn notify(&mut self, level: NoticeLevel, title: &str, message: String) {
        match level {
            NoticeLevel::Info => println!("[{}] {}", title, message),
            NoticeLevel::Error => eprintln!("[{}] {}", title, message),
        }
        self.state.notices.push(Notice {
            tick: self.state.tick,
            level,
            title: title.to_string(),
            message,
        });
    }

    fn log(&mut self, stage: &str) -> Result<(), LabError> {
        if let Some(logger) = &mut self.logger {
            logger.log_state(&self.state, self.scoreboard.score(), stage)?;
        }
        self.state.events.clear();
        Ok(())
    }

    // --- getters -------------------------------------------------------

    pub fn get_tick(&self) -> u64 {
        self.state.tick
    }

    pub fn get_state(&self) -> &LabState {
        &self.state
    }

    pub fn containers(&self) -> &[Container] {
        &self.state.containers
    }

    pub fn container(&self, id: &str) -> Option<&Container> {
        self.state.container(id)
    }

    pub fn reactions(&self) -> &[ReactionRecord] {
        &self.state.reactions
    }

    pub fn alerts(&self) -> &[SafetyAlert] {
        &self.state.alerts
    }

    pub fn notices(&self) -> &[Notice] {
        &self.state.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.state.notices)
    }

    pub fn experiment(&self) -> &ExperimentState {
        &self.state.experiment
    }

    pub fn active_effects(&self) -> &[ActiveEffect] {
        self.effects.active()
    }

    pub fn effects(&self) -> &EffectDispatcher {
        &self.effects
    }

    pub fn score(&self) -> u32 {
        self.scoreboard.score()
    }

    pub fn badges(&self) -> &[String] {
        self.scoreboard.badges()
    }

    pub fn level(&self) -> u32 {
        self.scoreboard.level()
    }

    pub fn revision(&self) -> u64 {
        self.state.revision
    }

    pub fn config(&self) -> &LabConfig {
        &self.config
    }

    pub fn catalog(&self) -> &SubstanceCatalog {
        &self.catalog
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn selected_bottle(&self) -> Option<&str> {
        self.selected_bottle.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::builder::LabBuilder;

    fn active_engine() -> LabEngine {
        let mut engine = LabBuilder::new().build().unwrap();
        engine.start_experiment().unwrap();
        engine
    }

    fn beaker(engine: &mut LabEngine, x: f64) -> String {
        engine.place(EquipmentKind::Beaker, [x, 0.0, 0.0], None).unwrap()
    }

    #[test]
    fn start_awards_points_and_names_session() {
        let engine = active_engine();
        assert_eq!(engine.score(), scoring::POINTS_START);
        let session = engine.experiment().current_session.clone().unwrap();
        assert!(session.starts_with("exp-"));
    }

    #[test]
    fn pause_then_start_is_illegal() {
        let mut engine = active_engine();
        engine.pause_experiment().unwrap();
        let err = engine.start_experiment().unwrap_err();
        assert!(matches!(err, LabError::IllegalTransition { action: "start", .. }));
        engine.resume_experiment().unwrap();
        assert!(engine.experiment().is_active());
    }

    #[test]
    fn placement_respects_bounds_and_spacing() {
        let mut engine = active_engine();
        let first = beaker(&mut engine, 0.0);

        let err = engine
            .place(EquipmentKind::Beaker, [0.1, 0.0, 0.1], None)
            .unwrap_err();
        assert!(matches!(err, LabError::PositionOccupied(id) if id == first));

        let err = engine
            .place(EquipmentKind::Beaker, [10.0, 0.0, 0.0], None)
            .unwrap_err();
        assert!(matches!(err, LabError::OutOfBounds { .. }));
        assert_eq!(engine.containers().len(), 1);
        assert_eq!(engine.notices().len(), 3);
    }

    #[test]
    fn bottle_requires_a_chemical() {
        let mut engine = active_engine();
        let err = engine
            .place(EquipmentKind::ChemicalBottle, [1.0, 0.0, 0.0], None)
            .unwrap_err();
        assert!(matches!(err, LabError::MissingBottleChemical(_)));
    }

    #[test]
    fn set_volume_rescales_and_rejects_empty() {
        let mut engine = active_engine();
        let id = beaker(&mut engine, 0.0);
        assert!(matches!(
            engine.set_volume(&id, 10.0),
            Err(LabError::EmptyContainer(_))
        ));

        engine.add_chemical(&id, "Water", 40.0).unwrap();
        engine.set_volume(&id, 10.0).unwrap();
        let container = engine.container(&id).unwrap();
        assert!((container.total_volume - 10.0).abs() < 1e-9);
        assert!(container.volume_is_consistent());

        assert!(matches!(
            engine.set_volume(&id, f64::NAN),
            Err(LabError::InvalidAmount(_))
        ));
    }

    #[test]
    fn heated_container_evaporates_to_zero_and_stops() {
        let mut engine = active_engine();
        let id = beaker(&mut engine, 0.0);
        engine.add_chemical(&id, "Water", 1.2).unwrap();
        engine.set_heated(&id, true).unwrap();
        engine.advance(4).unwrap();
        let container = engine.container(&id).unwrap();
        assert_eq!(container.total_volume, 0.0);
        assert!(container.volume_is_consistent());
        assert_eq!(container.temperature, 60.0);
    }

    #[test]
    fn evaporation_bumps_the_revision_but_an_idle_tick_does_not() {
        let mut engine = active_engine();
        let id = beaker(&mut engine, 0.0);
        engine.add_chemical(&id, "Water", 10.0).unwrap();
        engine.tick().unwrap();
        let idle = engine.revision();
        engine.tick().unwrap();
        assert_eq!(engine.revision(), idle);

        engine.set_heated(&id, true).unwrap();
        let before = engine.revision();
        engine.advance(4).unwrap();
        assert_eq!(engine.container(&id).unwrap().total_volume, 8.0);
        assert!(engine.revision() > before);
    }

    #[test]
    fn huge_intervals_never_overflow() {
        let config = LabConfig {
            refill_cooldown_secs: u64::MAX,
            auto_save_interval_secs: u64::MAX,
            ..Default::default()
        };
        let mut engine = LabBuilder::new()
            .with_config(config)
            .with_user("student-1")
            .build()
            .unwrap();
        engine.start_experiment().unwrap();
        let chemical = BottleChemical::from(engine.catalog().get("Water").unwrap());
        let bottle = engine
            .place(EquipmentKind::ChemicalBottle, [-1.0, 0.0, 0.0], Some(chemical))
            .unwrap();
        let target = beaker(&mut engine, 1.0);
        engine.pour(&bottle, &target, 500.0).unwrap();

        engine.advance(3).unwrap();
        let remaining = engine.container(&bottle).unwrap().bottle.as_ref().unwrap().volume_remaining;
        assert_eq!(remaining, 0.0);
        assert!(!engine.auto_save_due());
    }

    #[test]
    fn burette_cannot_be_heated() {
        let mut engine = active_engine();
        let id = engine
            .place(EquipmentKind::Burette, [1.0, 0.0, 0.0], None)
            .unwrap();
        assert!(matches!(
            engine.set_heated(&id, true),
            Err(LabError::InvalidTarget(_))
        ));
    }

    #[test]
    fn same_substance_twice_does_not_queue_a_resolution() {
        let mut engine = active_engine();
        let id = beaker(&mut engine, 0.0);
        engine.add_chemical(&id, "Water", 10.0).unwrap();
        engine.add_chemical(&id, "water", 10.0).unwrap();
        assert_eq!(engine.pending_resolutions(), 0);
        engine.add_chemical(&id, "Hydrochloric Acid", 10.0).unwrap();
        assert_eq!(engine.pending_resolutions(), 1);
    }

    #[test]
    fn reset_clears_bench_and_score() {
        let mut engine = active_engine();
        let id = beaker(&mut engine, 0.0);
        engine.add_chemical(&id, "Water", 10.0).unwrap();
        engine.add_chemical(&id, "Sodium Chloride", 10.0).unwrap();
        engine.reset();
        assert!(engine.containers().is_empty());
        assert_eq!(engine.pending_resolutions(), 0);
        assert_eq!(engine.score(), 0);
        assert_eq!(engine.experiment().status, ExperimentStatus::Idle);
    }
}

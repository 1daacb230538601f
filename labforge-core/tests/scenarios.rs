use approx::assert_relative_eq;
use labforge_core::{
    error::LabError,
    persistence::{self, KeyValueStore, MemoryStore, STORAGE_KEY},
    resolver::{
        local::ReactionTable,
        remote::{InferenceClient, InferenceError, InferenceRequest},
        ReactionResolver, Resolution,
    },
    simulation::{builder::LabBuilder, engine::LabEngine, state::ResolutionState},
};
use labforge_schemas::{
    chemical::BottleChemical,
    equipment::EquipmentKind,
    reaction::OutcomeSource,
    session::ExperimentStatus,
};
use std::cell::RefCell;

struct MockClient {
    responses: RefCell<Vec<Result<String, InferenceError>>>,
    seen: RefCell<Vec<InferenceRequest>>,
}

impl MockClient {
    fn failing() -> Self {
        Self::with(vec![])
    }

    fn with(responses: Vec<Result<String, InferenceError>>) -> Self {
        Self {
            responses: RefCell::new(responses),
            seen: RefCell::new(Vec::new()),
        }
    }
}

impl InferenceClient for MockClient {
    fn infer(&self, request: &InferenceRequest) -> Result<String, InferenceError> {
        self.seen.borrow_mut().push(request.clone());
        let mut responses = self.responses.borrow_mut();
        if responses.is_empty() {
            return Err(InferenceError::Http {
                message: "connection refused".to_string(),
            });
        }
        responses.remove(0)
    }
}

fn active_engine() -> LabEngine {
    let mut engine = LabBuilder::new().build().unwrap();
    engine.start_experiment().unwrap();
    engine
}

fn bottle_of(engine: &mut LabEngine, substance: &str, x: f64) -> String {
    let chemical = BottleChemical::from(engine.catalog().get(substance).unwrap());
    engine
        .place(EquipmentKind::ChemicalBottle, [x, 0.0, -1.0], Some(chemical))
        .unwrap()
}

fn beaker(engine: &mut LabEngine, x: f64) -> String {
    engine
        .place(EquipmentKind::Beaker, [x, 0.0, 1.0], None)
        .unwrap()
}

fn remaining(engine: &LabEngine, bottle: &str) -> f64 {
    engine
        .container(bottle)
        .and_then(|c| c.bottle.as_ref())
        .map(|b| b.volume_remaining)
        .unwrap()
}

#[test]
fn scenario_a_neutralization_collapses_to_salt_solution() {
    let mut engine = active_engine();
    let hcl = bottle_of(&mut engine, "HCl", -2.0);
    let target = beaker(&mut engine, 0.0);

    engine.pour(&hcl, &target, 50.0).unwrap();
    engine.add_chemical(&target, "Sodium Hydroxide", 50.0).unwrap();
    assert!(engine.container(&target).unwrap().resolution.is_resolving());

    let resolver = ReactionResolver::new(MockClient::failing(), ReactionTable::builtin());
    assert_eq!(engine.run_pending_resolutions(&resolver), 1);

    let reaction = &engine.reactions()[0];
    assert_eq!(reaction.outcome.reaction_name, "Acid-Base Neutralization");
    assert_relative_eq!(reaction.outcome.energy, 57.3);
    assert_eq!(reaction.outcome.source, OutcomeSource::LocalTable);

    let container = engine.container(&target).unwrap();
    assert_eq!(container.contents.len(), 1);
    assert_eq!(container.contents[0].name, "Sodium Chloride Solution");
    assert_relative_eq!(container.total_volume, 100.0);
    assert_eq!(container.reaction_type.as_deref(), Some("Acid-Base Neutralization"));
    assert_relative_eq!(container.reaction_progress, 1.0);
    assert!(container.temperature > engine.config().ambient_temperature);
    assert!(matches!(container.resolution, ResolutionState::Applied { .. }));

    assert!(engine.badges().iter().any(|b| b == "First Reaction"));
    assert_eq!(engine.score(), 10 + 10 + 10 + 15 + 20);
    assert!(!engine.active_effects().is_empty());
}

#[test]
fn scenario_b_overdraw_is_rejected_without_mutation() {
    let mut engine = active_engine();
    let hcl = bottle_of(&mut engine, "HCl", -2.0);
    let target = beaker(&mut engine, 0.0);
    let before = engine.container(&target).unwrap().clone();
    let notices_before = engine.notices().len();

    let err = engine.pour(&hcl, &target, 600.0).unwrap_err();
    assert!(matches!(err, LabError::InsufficientVolume { .. }));
    assert_relative_eq!(remaining(&engine, &hcl), 500.0);
    assert_eq!(engine.container(&target).unwrap(), &before);

    let notices = &engine.notices()[notices_before..];
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].title, "Insufficient Volume");
}

#[test]
fn scenario_c_drained_bottle_is_unusable_until_refilled_once() {
    let mut engine = active_engine();
    let hcl = bottle_of(&mut engine, "HCl", -2.0);
    let first = beaker(&mut engine, 0.0);
    let second = beaker(&mut engine, 2.0);

    engine.pour(&hcl, &first, 200.0).unwrap();
    engine.pour(&hcl, &second, 200.0).unwrap();
    engine.pour(&hcl, &first, 100.0).unwrap();
    assert_eq!(remaining(&engine, &hcl), 0.0);

    assert!(matches!(engine.select_bottle(&hcl), Err(LabError::BottleEmpty(_))));
    assert!(matches!(engine.pour(&hcl, &second, 10.0), Err(LabError::BottleEmpty(_))));

    engine.advance(4).unwrap();
    assert_eq!(remaining(&engine, &hcl), 0.0);
    engine.advance(1).unwrap();
    assert_relative_eq!(remaining(&engine, &hcl), 500.0);

    engine.advance(10).unwrap();
    let bottle = engine.container(&hcl).unwrap().bottle.clone().unwrap();
    assert_eq!(bottle.refill_count, 1);
    assert_relative_eq!(bottle.volume_remaining, 500.0);
    engine.select_bottle(&hcl).unwrap();
}

#[test]
fn scenario_d_unmatched_pair_keeps_both_quantities() {
    let mut engine = active_engine();
    let target = beaker(&mut engine, 0.0);
    engine.add_chemical(&target, "Water", 30.0).unwrap();
    engine.add_chemical(&target, "Ethanol", 20.0).unwrap();

    let client = MockClient::failing();
    let resolver = ReactionResolver::new(client, ReactionTable::builtin());
    engine.run_pending_resolutions(&resolver);

    assert!(engine.reactions().is_empty());
    let container = engine.container(&target).unwrap();
    assert_eq!(container.contents.len(), 2);
    assert_relative_eq!(container.total_volume, 50.0);
    assert_eq!(container.resolution, ResolutionState::Idle);
    assert_eq!(container.reaction_type.as_deref(), Some("Chemical Mixing"));
}

#[test]
fn scenario_e_inactive_session_rejects_every_mutation() {
    let mut engine = LabBuilder::new().build().unwrap();
    assert!(matches!(
        engine.place(EquipmentKind::Beaker, [0.0; 3], None),
        Err(LabError::SessionInactive(ExperimentStatus::Idle))
    ));

    engine.start_experiment().unwrap();
    let hcl = bottle_of(&mut engine, "HCl", -2.0);
    let target = beaker(&mut engine, 0.0);
    engine.pause_experiment().unwrap();
    let revision = engine.revision();

    assert!(matches!(
        engine.add_chemical(&target, "Water", 5.0),
        Err(LabError::SessionInactive(ExperimentStatus::Paused))
    ));
    assert!(matches!(
        engine.pour(&hcl, &target, 5.0),
        Err(LabError::SessionInactive(_))
    ));
    assert!(matches!(engine.remove(&target), Err(LabError::SessionInactive(_))));
    assert_eq!(engine.revision(), revision);
    assert_eq!(engine.containers().len(), 2);
    assert!(engine.container(&target).unwrap().contents.is_empty());
    assert_relative_eq!(remaining(&engine, &hcl), 500.0);
}

#[test]
fn non_positive_pours_are_rejected() {
    let mut engine = active_engine();
    let hcl = bottle_of(&mut engine, "HCl", -2.0);
    let target = beaker(&mut engine, 0.0);
    for amount in [0.0, -5.0, f64::NAN, f64::INFINITY] {
        assert!(matches!(
            engine.pour(&hcl, &target, amount),
            Err(LabError::InvalidAmount(_))
        ));
    }
    assert_relative_eq!(remaining(&engine, &hcl), 500.0);
    assert!(engine.container(&target).unwrap().contents.is_empty());
}

#[test]
fn volumes_stay_consistent_through_mixed_operations() {
    let mut engine = active_engine();
    let hcl = bottle_of(&mut engine, "HCl", -2.0);
    let salt = bottle_of(&mut engine, "NaCl", 2.0);
    let target = beaker(&mut engine, 0.0);

    engine.pour(&hcl, &target, 33.3).unwrap();
    engine.pour(&salt, &target, 12.7).unwrap();
    engine.add_chemical(&target, "Water", 7.25).unwrap();
    engine.set_heated(&target, true).unwrap();
    engine.advance(3).unwrap();
    engine.set_volume(&target, 20.0).unwrap();
    engine.advance(2).unwrap();

    for container in engine.containers() {
        assert!(container.volume_is_consistent(), "{} drifted", container.id);
        if let Some(bottle) = &container.bottle {
            assert!(bottle.volume_remaining >= 0.0);
            assert!(bottle.volume_remaining <= bottle.max_volume);
        }
    }
}

#[test]
fn fallback_respects_required_temperature() {
    let mut engine = LabBuilder::new()
        .with_config(labforge_core::config::LabConfig {
            ambient_temperature: 10.0,
            ..Default::default()
        })
        .build()
        .unwrap();
    engine.start_experiment().unwrap();
    let target = beaker(&mut engine, 0.0);
    engine.add_chemical(&target, "HCl", 10.0).unwrap();
    engine.add_chemical(&target, "NaOH", 10.0).unwrap();

    let resolver = ReactionResolver::new(MockClient::failing(), ReactionTable::builtin());
    let request = engine.next_resolution_request().unwrap();
    assert_relative_eq!(request.temperature, 10.0);
    let report = resolver.resolve(&request);
    assert_eq!(report.resolution, Resolution::NoReaction);
    assert!(engine.apply_resolution(report));
    assert!(engine.reactions().is_empty());
}

#[test]
fn remote_outcome_wins_over_table() {
    let mut engine = active_engine();
    let target = beaker(&mut engine, 0.0);
    engine.add_chemical(&target, "Hydrochloric Acid", 40.0).unwrap();
    engine.add_chemical(&target, "Sodium Hydroxide", 40.0).unwrap();

    let answer = r##"```json
{"reactionName": "Salt Formation", "reacts": true, "outputChemical": "Brine",
 "outputVolume": "75", "finalColor": "#FFFFFF", "energy": 10, "gas": "", "danger": "none"}
```"##;
    let client = MockClient::with(vec![Ok(answer.to_string())]);
    let resolver = ReactionResolver::new(client, ReactionTable::builtin());
    engine.run_pending_resolutions(&resolver);

    let container = engine.container(&target).unwrap();
    assert_eq!(container.contents[0].name, "Brine");
    assert_relative_eq!(container.total_volume, 75.0);
    assert_eq!(container.contents[0].color, "#FFFFFF");
    assert_eq!(engine.reactions()[0].outcome.source, OutcomeSource::Remote);
    assert!(engine.alerts().is_empty());
    assert!(engine.reactions()[0].outcome.color_change.is_some());
}

#[test]
fn garbled_remote_color_does_not_break_later_checks() {
    let mut engine = active_engine();
    let target = beaker(&mut engine, 0.0);
    engine.add_chemical(&target, "HCl", 20.0).unwrap();
    engine.add_chemical(&target, "NaOH", 20.0).unwrap();

    let answer = r##"{"reactionName": "X", "reacts": true, "outputChemical": "Goo", "finalColor": "#1é234"}"##;
    let client = MockClient::with(vec![Ok(answer.to_string())]);
    let resolver = ReactionResolver::new(client, ReactionTable::builtin());
    assert_eq!(engine.run_pending_resolutions(&resolver), 1);
    assert_eq!(engine.container(&target).unwrap().contents[0].name, "Goo");

    engine.add_chemical(&target, "Water", 10.0).unwrap();
    assert_eq!(engine.run_pending_resolutions(&resolver), 1);

    let container = engine.container(&target).unwrap();
    assert_eq!(container.contents.len(), 2);
    assert_relative_eq!(container.total_volume, 50.0);
}

#[test]
fn deliveries_queue_behind_an_in_flight_resolution() {
    let mut engine = active_engine();
    let water = bottle_of(&mut engine, "H2O", 2.0);
    let target = beaker(&mut engine, 0.0);
    engine.add_chemical(&target, "HCl", 25.0).unwrap();
    engine.add_chemical(&target, "NaOH", 25.0).unwrap();

    let request = engine.next_resolution_request().unwrap();
    engine.pour(&water, &target, 10.0).unwrap();
    assert_relative_eq!(remaining(&engine, &water), 490.0);
    let container = engine.container(&target).unwrap();
    assert_eq!(container.contents.len(), 2);
    assert_eq!(container.pending_deliveries.len(), 1);

    let resolver = ReactionResolver::offline(ReactionTable::builtin());
    assert!(engine.apply_resolution(resolver.resolve(&request)));

    let container = engine.container(&target).unwrap();
    assert_eq!(container.contents.len(), 2);
    assert_eq!(container.contents[0].name, "Sodium Chloride Solution");
    assert_eq!(container.contents[1].name, "Water");
    assert_relative_eq!(container.total_volume, 60.0);
    assert!(container.pending_deliveries.is_empty());
    assert_eq!(engine.pending_resolutions(), 1);
}

#[test]
fn results_for_removed_containers_are_dropped() {
    let mut engine = active_engine();
    let target = beaker(&mut engine, 0.0);
    engine.add_chemical(&target, "HCl", 25.0).unwrap();
    engine.add_chemical(&target, "NaOH", 25.0).unwrap();

    let request = engine.next_resolution_request().unwrap();
    engine.remove(&target).unwrap();

    let resolver = ReactionResolver::offline(ReactionTable::builtin());
    assert!(!engine.apply_resolution(resolver.resolve(&request)));
    assert!(engine.reactions().is_empty());

    let other = beaker(&mut engine, 1.0);
    engine.add_chemical(&other, "HCl", 5.0).unwrap();
    engine.add_chemical(&other, "NaOH", 5.0).unwrap();
    engine.reset();
    assert_eq!(engine.run_pending_resolutions(&resolver), 0);
}

#[test]
fn incompatible_mixture_raises_critical_alert() {
    let mut engine = active_engine();
    let target = beaker(&mut engine, 0.0);
    engine.add_chemical(&target, "Sulfuric Acid", 10.0).unwrap();
    engine.add_chemical(&target, "Ethanol", 10.0).unwrap();

    let client = MockClient::with(vec![Ok(
        r#"{"reactionName": "Dehydration", "reacts": true, "energy": 30}"#.to_string(),
    )]);
    let resolver = ReactionResolver::new(client, ReactionTable::builtin());
    engine.run_pending_resolutions(&resolver);

    assert_eq!(engine.alerts().len(), 1);
    assert_eq!(engine.alerts()[0].action, "STOP IMMEDIATELY");
    assert_eq!(engine.container(&target).unwrap().contents.len(), 2);

    engine.clear_alerts();
    assert!(engine.alerts().is_empty());
}

#[test]
fn snapshot_survives_a_restart() {
    let mut engine = active_engine();
    let hcl = bottle_of(&mut engine, "HCl", -2.0);
    let target = beaker(&mut engine, 0.0);
    engine.pour(&hcl, &target, 50.0).unwrap();
    engine.add_chemical(&target, "NaOH", 50.0).unwrap();
    let resolver = ReactionResolver::offline(ReactionTable::builtin());
    engine.run_pending_resolutions(&resolver);

    let mut store = MemoryStore::new();
    persistence::save_snapshot(&mut store, &engine).unwrap();
    assert!(store.get(STORAGE_KEY).unwrap().is_some());

    let mut restored = LabBuilder::new().build().unwrap();
    restored.restore(persistence::load_snapshot(&store));

    assert_eq!(restored.containers().len(), 2);
    assert_eq!(restored.reactions().len(), 1);
    assert_eq!(restored.score(), engine.score());
    assert_eq!(restored.badges(), engine.badges());
    assert_eq!(restored.experiment().status, ExperimentStatus::Active);
    assert_eq!(
        restored.experiment().start_time,
        engine.experiment().start_time
    );
    let container = restored.container(&target).unwrap();
    assert_eq!(container.reaction_type.as_deref(), Some("Acid-Base Neutralization"));
    assert!(matches!(container.resolution, ResolutionState::Applied { .. }));
    assert_relative_eq!(remaining(&restored, &hcl), 450.0);

    persistence::clear_snapshot(&mut store).unwrap();
    restored.restore(persistence::load_snapshot(&store));
    assert!(restored.containers().is_empty());
    assert_eq!(restored.experiment().status, ExperimentStatus::Idle);
}

#[test]
fn auto_save_needs_user_and_interval() {
    let mut anonymous = active_engine();
    anonymous.advance(61).unwrap();
    assert!(!anonymous.auto_save_due());

    let mut engine = LabBuilder::new().with_user("student-1").build().unwrap();
    engine.start_experiment().unwrap();
    engine.advance(59).unwrap();
    assert!(!engine.auto_save_due());
    engine.advance(1).unwrap();
    assert!(engine.auto_save_due());
    engine.mark_auto_saved();
    assert!(!engine.auto_save_due());

    engine.set_auto_save(false);
    engine.advance(60).unwrap();
    assert!(!engine.auto_save_due());
}

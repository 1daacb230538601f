use anyhow::{Context, Result};
use labforge_core::{
    analysis::{self, LabUsage},
    persistence::{self, ExperimentStore, KeyValueStore},
    resolver::{remote::InferenceClient, ReactionResolver},
    simulation::engine::LabEngine,
};
use labforge_schemas::{command::LabCommand, file_formats::LabScriptFile};
use std::{collections::HashMap, fs, path::Path};

/// What happened while a script ran.
#[derive(Debug, Default)]
pub struct RunOutcome {
    pub steps: usize,
    pub rejected: Vec<(usize, String)>,
    pub resolutions: usize,
    pub uploads: usize,
}

pub fn load_script(path: &Path) -> Result<LabScriptFile> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read lab script {:?}", path))?;
    serde_yaml::from_str(&content).with_context(|| format!("Failed to parse lab script {:?}", path))
}

/// Runs every step of `script` against `engine`. Rejected steps are reported
/// and skipped, the way the bench shows a notice and carries on. Pending
/// reactions are resolved after each step and the snapshot is rewritten
/// whenever the bench changed.
pub fn run_script<C: InferenceClient>(
    script: &LabScriptFile,
    engine: &mut LabEngine,
    resolver: &ReactionResolver<C>,
    store: &mut dyn KeyValueStore,
    experiments: Option<&dyn ExperimentStore>,
) -> Result<RunOutcome> {
    println!(
        "\n--- [Workflow] Running lab script '{}' ({} steps) ---",
        script.name.as_deref().unwrap_or("unnamed"),
        script.steps.len()
    );
    let mut labels: HashMap<String, String> = HashMap::new();
    let mut outcome = RunOutcome::default();
    let mut saved_revision = engine.revision();

    for (index, step) in script.steps.iter().enumerate() {
        let step_no = index + 1;
        let label = match step {
            LabCommand::Place { label, .. } => label.clone(),
            _ => None,
        };
        let command = resolve_labels(step.clone(), &labels);

        let mut accepted = true;
        match engine.execute(command) {
            Ok(Some(id)) => {
                if let Some(label) = label {
                    labels.insert(label, id);
                }
            }
            Ok(None) => {}
            Err(err) if err.is_rejection() => {
                println!("[Workflow] Step {} rejected: {}", step_no, err);
                outcome.rejected.push((step_no, err.to_string()));
                accepted = false;
            }
            Err(err) => {
                return Err(err).with_context(|| format!("Lab script step {} failed", step_no))
            }
        }
        outcome.steps += 1;
        outcome.resolutions += engine.run_pending_resolutions(resolver);

        if engine.revision() != saved_revision {
            let saved = if matches!(step, LabCommand::ResetLab) {
                persistence::clear_snapshot(store)
            } else {
                persistence::save_snapshot(store, engine)
            };
            match saved {
                Ok(()) => saved_revision = engine.revision(),
                Err(err) => eprintln!("[Workflow] Failed to save lab state: {}", err),
            }
        }

        let completed = accepted && matches!(step, LabCommand::CompleteExperiment);
        if engine.auto_save_due() || completed {
            if upload_summary(engine, experiments, script.name.as_deref()) {
                outcome.uploads += 1;
            }
            engine.mark_auto_saved();
        }
    }
    Ok(outcome)
}

/// Sends the session summary to the experiments store, if one is set up and
/// the bench has a user. Failures are logged and otherwise ignored.
fn upload_summary(
    engine: &LabEngine,
    experiments: Option<&dyn ExperimentStore>,
    experiment_name: Option<&str>,
) -> bool {
    let (Some(store), Some(summary)) = (experiments, analysis::summarize(engine, experiment_name)) else {
        return false;
    };
    match store.save_experiment(&summary) {
        Ok(()) => {
            println!("[Workflow] Experiment summary saved for '{}'.", summary.user_id);
            true
        }
        Err(err) => {
            eprintln!("[Workflow] Failed to save experiment summary: {}", err);
            false
        }
    }
}

/// Rewrites the container references of a command through the label map.
/// Unknown references pass through untouched, so raw ids keep working.
fn resolve_labels(command: LabCommand, labels: &HashMap<String, String>) -> LabCommand {
    let id = |reference: String| labels.get(&reference).cloned().unwrap_or(reference);
    match command {
        LabCommand::Move {
            container,
            position,
        } => LabCommand::Move {
            container: id(container),
            position,
        },
        LabCommand::Remove { container } => LabCommand::Remove {
            container: id(container),
        },
        LabCommand::AddChemical {
            container,
            substance,
            volume_ml,
        } => LabCommand::AddChemical {
            container: id(container),
            substance,
            volume_ml,
        },
        LabCommand::Pour {
            bottle,
            target,
            amount_ml,
        } => LabCommand::Pour {
            bottle: id(bottle),
            target: id(target),
            amount_ml,
        },
        LabCommand::QuickPour {
            bottle,
            target,
            amount,
        } => LabCommand::QuickPour {
            bottle: id(bottle),
            target: id(target),
            amount,
        },
        LabCommand::SelectBottle { bottle } => LabCommand::SelectBottle { bottle: id(bottle) },
        LabCommand::SetVolume {
            container,
            volume_ml,
        } => LabCommand::SetVolume {
            container: id(container),
            volume_ml,
        },
        LabCommand::SetHeated { container, heated } => LabCommand::SetHeated {
            container: id(container),
            heated,
        },
        other => other,
    }
}

pub fn print_bench(engine: &LabEngine) {
    println!("\n--- [Bench] tick {} | experiment {} ---", engine.get_tick(), engine.experiment().status);
    if engine.containers().is_empty() {
        println!("  (empty)");
    }
    for container in engine.containers() {
        match &container.bottle {
            Some(bottle) => println!(
                "  - {:<22} {:<20} {:>7.1} / {:.0} mL",
                container.id, bottle.chemical.name, bottle.volume_remaining, bottle.max_volume
            ),
            None => {
                let contents: Vec<String> = container
                    .contents
                    .iter()
                    .map(|q| format!("{} {:.1} mL", q.name, q.volume))
                    .collect();
                println!(
                    "  - {:<22} {:>7.1} mL {:>6.1} °C pH {:>4.1}  {}{}",
                    container.id,
                    container.total_volume,
                    container.temperature,
                    container.ph,
                    contents.join(", "),
                    container
                        .reaction_type
                        .as_ref()
                        .map(|r| format!("  [{}]", r))
                        .unwrap_or_default()
                );
            }
        }
    }
}

pub fn print_summary_report(engine: &LabEngine, outcome: &RunOutcome, usage: Option<&LabUsage>) {
    println!("\n\n--- [Final Summary Report] ---");
    println!("========================================");
    println!("Steps run: {} ({} rejected)", outcome.steps, outcome.rejected.len());
    for (step, reason) in &outcome.rejected {
        println!("  - step {}: {}", step, reason);
    }
    println!("Resolutions applied: {}", outcome.resolutions);
    println!("Summaries uploaded: {}", outcome.uploads);
    println!("----------------------------------------");

    println!("\nReactions:");
    if engine.reactions().is_empty() {
        println!("  - none");
    }
    for record in engine.reactions() {
        println!(
            "  - [{}] {} in {} ({:?}, {:.1} kJ)",
            record.tick,
            record.outcome.reaction_name,
            record.equipment_id,
            record.outcome.source,
            record.outcome.energy
        );
    }

    println!("\nSafety alerts:");
    if engine.alerts().is_empty() {
        println!("  - none");
    }
    for alert in engine.alerts() {
        println!("  - {:?}: {} ({})", alert.level, alert.message, alert.action);
    }

    if let Some(usage) = usage {
        println!("\nUsage:");
        println!("  - Added to containers:");
        for (name, ml) in &usage.added_ml {
            println!("    - {}: {:.1} mL", name, ml);
        }
        println!("  - Pours: {}", usage.pours);
        println!("  - Evaporated: {:.1} mL", usage.evaporated_ml);
        println!("  - Bottle refills: {}", usage.refills);
        println!("  - Peak temperature: {:.1} °C", usage.peak_temperature_c);
        println!("  - Discarded resolutions: {}", usage.discarded_resolutions);
    }

    println!(
        "\nScore: {} (level {}) | Badges: {}",
        engine.score(),
        engine.level(),
        if engine.badges().is_empty() {
            "none".to_string()
        } else {
            engine.badges().join(", ")
        }
    );
    println!("========================================");
}

use crate::{
    error::LabError,
    simulation::{engine::LabEngine, state::LabEvent},
};
use chrono::Utc;
use labforge_schemas::experiment::{
    EquipmentDetail, ExperimentResults, ExperimentSummary, PerformedReaction,
};
use serde::Deserialize;
use std::collections::BTreeMap;

/// One row of the time-series CSV written by `TimeSeriesLogger`.
#[derive(Debug, Deserialize)]
pub struct LogEntry {
    pub tick: u64,
    pub stage: String,
    pub session_status: String,
    pub container_count: usize,
    pub total_volume_ml: f64,
    pub max_temperature_c: f64,
    pub containers_json: String,
    pub reactions: usize,
    pub alerts: usize,
    pub score: u32,
    pub events_json: String,
}

/// Totals accumulated from the events of a run.
#[derive(Debug, Default, Clone)]
pub struct LabUsage {
    pub rows: u64,
    pub ticks: u64,
    /// mL that landed in containers, by chemical name. Counts pours and
    /// direct additions alike.
    pub added_ml: BTreeMap<String, f64>,
    pub pours: u64,
    pub evaporated_ml: f64,
    pub refills: u64,
    pub reactions: Vec<String>,
    pub alerts: u64,
    pub discarded_resolutions: u64,
    pub peak_temperature_c: f64,
}

pub fn read_log(log_path: &str) -> Result<Vec<LogEntry>, LabError> {
    let mut reader =
        csv::Reader::from_path(log_path).map_err(|e| LabError::CsvError(log_path.to_string(), e))?;
    let mut rows = Vec::new();
    for result in reader.deserialize() {
        let record: LogEntry = result.map_err(|e| LabError::CsvError(log_path.to_string(), e))?;
        rows.push(record);
    }
    Ok(rows)
}

pub fn usage_from_log(log_path: &str) -> Result<LabUsage, LabError> {
    let mut usage = LabUsage::default();

    for record in read_log(log_path)? {
        usage.rows += 1;
        if record.stage == "tick" {
            usage.ticks += 1;
        }
        usage.peak_temperature_c = usage.peak_temperature_c.max(record.max_temperature_c);

        let events: Vec<LabEvent> = serde_json::from_str(&record.events_json)?;
        for event in events {
            match event {
                LabEvent::ChemicalAdded { name, volume, .. } => {
                    *usage.added_ml.entry(name).or_insert(0.0) += volume;
                }
                LabEvent::Poured { .. } => usage.pours += 1,
                LabEvent::Evaporated { amount, .. } => usage.evaporated_ml += amount,
                LabEvent::BottleRefilled { .. } => usage.refills += 1,
                LabEvent::ReactionApplied { reaction_name, .. } => usage.reactions.push(reaction_name),
                LabEvent::AlertRaised { .. } => usage.alerts += 1,
                LabEvent::ResolutionDiscarded { .. } => usage.discarded_resolutions += 1,
                _ => {}
            }
        }
    }
    Ok(usage)
}

/// Builds the record uploaded to the experiments store. `None` without a
/// user id, since summaries are namespaced per user.
pub fn summarize(engine: &LabEngine, experiment_name: Option<&str>) -> Option<ExperimentSummary> {
    let user_id = engine.user_id()?.to_string();
    let now = Utc::now();

    let mut chemicals_used: Vec<String> = Vec::new();
    let mut remember = |name: &str| {
        if !chemicals_used.iter().any(|c| c == name) {
            chemicals_used.push(name.to_string());
        }
    };
    for container in engine.containers() {
        match &container.bottle {
            Some(bottle) => remember(&bottle.chemical.name),
            None => container.contents.iter().for_each(|q| remember(&q.name)),
        }
    }

    let chemicals_mixed = engine
        .containers()
        .iter()
        .filter(|c| !c.is_bottle())
        .map(|c| c.contents.len())
        .sum();

    let session_duration = engine
        .experiment()
        .start_time
        .map(|start| (engine.experiment().end_time.unwrap_or(now) - start).num_seconds().max(0))
        .unwrap_or(0);

    let experiment_name = experiment_name
        .map(str::to_string)
        .or_else(|| engine.experiment().current_session.clone())
        .unwrap_or_else(|| "Virtual Lab Session".to_string());

    Some(ExperimentSummary {
        user_id,
        experiment_name,
        chemicals_used,
        results: ExperimentResults {
            reactions: engine.reactions().len(),
            equipment_used: engine.containers().len(),
            chemicals_mixed,
            session_duration,
            equipment_details: engine
                .containers()
                .iter()
                .map(|c| EquipmentDetail {
                    kind: c.kind.to_string(),
                    chemicals: c.contents.clone(),
                    total_volume: c.total_volume,
                })
                .collect(),
            reactions_performed: engine
                .reactions()
                .iter()
                .map(|r| PerformedReaction {
                    name: r.outcome.reaction_name.clone(),
                    reaction_type: r.outcome.reaction_type.clone(),
                    timestamp: r.started_at.to_rfc3339(),
                })
                .collect(),
            timestamp: now.to_rfc3339(),
        },
        score: engine.score(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::builder::LabBuilder;
    use labforge_schemas::{chemical::BottleChemical, equipment::EquipmentKind};

    #[test]
    fn anonymous_bench_has_no_summary() {
        let engine = LabBuilder::new().build().unwrap();
        assert!(summarize(&engine, None).is_none());
    }

    #[test]
    fn summary_lists_chemicals_once() {
        let mut engine = LabBuilder::new().with_user("student-7").build().unwrap();
        engine.start_experiment().unwrap();
        let hcl = BottleChemical::from(engine.catalog().get("HCl").unwrap());
        let bottle = engine
            .place(EquipmentKind::ChemicalBottle, [-1.0, 0.0, 0.0], Some(hcl))
            .unwrap();
        let beaker = engine
            .place(EquipmentKind::Beaker, [1.0, 0.0, 0.0], None)
            .unwrap();
        engine.pour(&bottle, &beaker, 20.0).unwrap();
        engine.pour(&bottle, &beaker, 5.0).unwrap();

        let summary = summarize(&engine, Some("Acids")).unwrap();
        assert_eq!(summary.user_id, "student-7");
        assert_eq!(summary.experiment_name, "Acids");
        assert_eq!(summary.chemicals_used, vec!["Hydrochloric Acid".to_string()]);
        assert_eq!(summary.results.equipment_used, 2);
        assert_eq!(summary.results.chemicals_mixed, 2);
        assert_eq!(summary.score, engine.score());
    }

    #[test]
    fn usage_counts_pours_and_additions_from_log() {
        let path = std::env::temp_dir().join(format!("labforge-usage-{}.csv", uuid::Uuid::new_v4()));
        let path = path.to_string_lossy().to_string();
        let mut engine = LabBuilder::new()
            .with_timeseries_logging_to_file(&path)
            .build()
            .unwrap();
        engine
            .execute(labforge_schemas::command::LabCommand::StartExperiment)
            .unwrap();
        let hcl = BottleChemical::from(engine.catalog().get("HCl").unwrap());
        let bottle = engine
            .place(EquipmentKind::ChemicalBottle, [-1.0, 0.0, 0.0], Some(hcl))
            .unwrap();
        let beaker = engine
            .place(EquipmentKind::Beaker, [1.0, 0.0, 0.0], None)
            .unwrap();
        engine
            .execute(labforge_schemas::command::LabCommand::Pour {
                bottle,
                target: beaker.clone(),
                amount_ml: 30.0,
            })
            .unwrap();
        engine
            .execute(labforge_schemas::command::LabCommand::AddChemical {
                container: beaker,
                substance: "Water".to_string(),
                volume_ml: 5.0,
            })
            .unwrap();
        engine.advance(2).unwrap();

        let usage = usage_from_log(&path).unwrap();
        assert_eq!(usage.pours, 1);
        assert_eq!(usage.ticks, 2);
        assert_eq!(usage.added_ml.get("Hydrochloric Acid"), Some(&30.0));
        assert_eq!(usage.added_ml.get("Water"), Some(&5.0));
        let _ = std::fs::remove_file(&path);
    }
}

use crate::simulation::state::LabState;
use csv::Writer;
use serde::Serialize;
use std::fs;
use std::io;

#[derive(Debug, Serialize)]
struct LogEntry {
    tick: u64,
    stage: String,
    session_status: String,
    container_count: usize,
    total_volume_ml: f64,
    max_temperature_c: f64,
    containers_json: String,
    reactions: usize,
    alerts: usize,
    score: u32,
    events_json: String,
}

/// Appends one CSV row per tick or command.
pub struct TimeSeriesLogger {
    writer: Writer<fs::File>,
}

impl TimeSeriesLogger {
    pub fn new(path: &str) -> Result<Self, io::Error> {
        let writer = Writer::from_path(path)?;
        Ok(Self { writer })
    }

    pub fn log_state(&mut self, state: &LabState, score: u32, stage: &str) -> Result<(), anyhow::Error> {
        let containers_json = serde_json::to_string(
            &state
                .containers
                .iter()
                .map(|c| {
                    (
                        c.id.clone(),
                        serde_json::json!({
                            "kind": c.kind,
                            "totalVolume": c.total_volume,
                            "temperature": c.temperature,
                            "pH": c.ph,
                            "reactionType": c.reaction_type,
                            "volumeRemaining": c.bottle.as_ref().map(|b| b.volume_remaining),
                        }),
                    )
                })
                .collect::<serde_json::Map<String, serde_json::Value>>(),
        )?;
        let events_json = serde_json::to_string(&state.events)?;

        let entry = LogEntry {
            tick: state.tick,
            stage: stage.to_string(),
            session_status: state.experiment.status.to_string(),
            container_count: state.containers.len(),
            total_volume_ml: state
                .containers
                .iter()
                .filter(|c| !c.is_bottle())
                .map(|c| c.total_volume)
                .sum(),
            max_temperature_c: state
                .containers
                .iter()
                .map(|c| c.temperature)
                .fold(0.0, f64::max),
            containers_json,
            reactions: state.reactions.len(),
            alerts: state.alerts.len(),
            score,
            events_json,
        };

        self.writer.serialize(entry)?;
        self.writer.flush()?;
        Ok(())
    }
}

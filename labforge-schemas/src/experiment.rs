//! Session summaries sent to the experiments store.

use crate::chemical::ChemicalQuantity;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentDetail {
    #[serde(rename = "type")]
    pub kind: String,
    pub chemicals: Vec<ChemicalQuantity>,
    pub total_volume: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformedReaction {
    pub name: String,
    #[serde(rename = "type")]
    pub reaction_type: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResults {
    pub reactions: usize,
    pub equipment_used: usize,
    pub chemicals_mixed: usize,
    /// Seconds since the session started.
    pub session_duration: i64,
    pub equipment_details: Vec<EquipmentDetail>,
    pub reactions_performed: Vec<PerformedReaction>,
    pub timestamp: String,
}

/// A row of the per-user experiment log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSummary {
    pub user_id: String,
    pub experiment_name: String,
    pub chemicals_used: Vec<String>,
    pub results: ExperimentResults,
    pub score: u32,
}

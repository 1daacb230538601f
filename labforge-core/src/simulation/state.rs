use labforge_schemas::{
    chemical::{BottleChemical, ChemicalQuantity},
    equipment::{EquipmentKind, Position},
    reaction::ReactionRecord,
    safety::SafetyAlert,
    session::ExperimentState,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Largest tolerated gap between `total_volume` and the sum of the contents.
pub const VOLUME_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LabEvent {
    Placed { id: String, kind: EquipmentKind },
    Moved { id: String },
    Removed { id: String },
    ChemicalAdded { container_id: String, name: String, volume: f64 },
    Poured { bottle_id: String, target_id: String, amount: f64 },
    DeliveryQueued { container_id: String, name: String, volume: f64 },
    VolumeAdjusted { container_id: String, volume: f64 },
    Evaporated { container_id: String, amount: f64 },
    BottleEmptied { bottle_id: String },
    BottleRefilled { bottle_id: String },
    ResolutionQueued { container_id: String, ticket: u64 },
    ReactionApplied { container_id: String, reaction_name: String },
    NoReaction { container_id: String },
    ResolutionDiscarded { container_id: String, ticket: u64 },
    AlertRaised { level: String, message: String },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A user-visible message, the toast of the bench.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notice {
    pub tick: u64,
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

/// Per-container reaction state: at most one resolution in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionState {
    #[default]
    Idle,
    Resolving { ticket: u64 },
    Applied { reaction_index: usize },
}

impl ResolutionState {
    pub fn is_resolving(&self) -> bool {
        matches!(self, ResolutionState::Resolving { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BottleState {
    pub chemical: BottleChemical,
    pub volume_remaining: f64,
    pub max_volume: f64,
    /// Tick at which the bottle last ran dry; cleared by the refill.
    #[serde(default)]
    pub emptied_at: Option<u64>,
    #[serde(default)]
    pub refill_count: u32,
}

impl BottleState {
    pub fn full(chemical: BottleChemical, max_volume: f64) -> Self {
        Self {
            chemical,
            volume_remaining: max_volume,
            max_volume,
            emptied_at: None,
            refill_count: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.volume_remaining <= 0.0
    }
}

/// A placed piece of equipment and what it currently holds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub id: String,
    pub kind: EquipmentKind,
    pub position: Position,
    #[serde(default, alias = "chemicalObjects")]
    pub contents: Vec<ChemicalQuantity>,
    #[serde(default)]
    pub total_volume: f64,
    #[serde(default)]
    pub temperature: f64,
    #[serde(default = "neutral_ph", rename = "pH")]
    pub ph: f64,
    #[serde(default)]
    pub viscosity: f64,
    #[serde(default)]
    pub is_heated: bool,
    #[serde(default)]
    pub reaction_type: Option<String>,
    #[serde(default)]
    pub reaction_progress: f64,
    /// Degrees above the baseline left behind by the last reaction.
    #[serde(default)]
    pub reaction_heat: f64,
    #[serde(default)]
    pub bottle: Option<BottleState>,
    /// Deliveries that arrived while a resolution was in flight.
    #[serde(default)]
    pub pending_deliveries: VecDeque<ChemicalQuantity>,
    #[serde(skip)]
    pub resolution: ResolutionState,
}

fn neutral_ph() -> f64 {
    7.0
}

impl Container {
    pub fn new(id: String, kind: EquipmentKind, position: Position) -> Self {
        Self {
            id,
            kind,
            position,
            contents: Vec::new(),
            total_volume: 0.0,
            temperature: 0.0,
            ph: neutral_ph(),
            viscosity: 0.0,
            is_heated: false,
            reaction_type: None,
            reaction_progress: 0.0,
            reaction_heat: 0.0,
            bottle: None,
            pending_deliveries: VecDeque::new(),
            resolution: ResolutionState::Idle,
        }
    }

    pub fn is_bottle(&self) -> bool {
        self.bottle.is_some()
    }

    pub fn volume_sum(&self) -> f64 {
        self.contents.iter().map(|c| c.volume).sum()
    }

    /// Re-derives `total_volume` from the contents.
    pub fn recompute_total(&mut self) {
        self.total_volume = self.volume_sum();
    }

    pub fn volume_is_consistent(&self) -> bool {
        (self.total_volume - self.volume_sum()).abs() < VOLUME_EPSILON
    }

    /// Rescales every quantity so the contents sum to `new_total`.
    /// Contents that currently sum to zero stay at zero.
    pub fn rescale_to(&mut self, new_total: f64) {
        let current = self.volume_sum();
        let scale = if current > 0.0 { new_total / current } else { 0.0 };
        for quantity in &mut self.contents {
            quantity.volume *= scale;
        }
        self.recompute_total();
    }

    /// Mirrors a bottle's remaining volume into `contents`.
    pub fn sync_bottle(&mut self) {
        if let Some(bottle) = &self.bottle {
            self.contents = vec![ChemicalQuantity::new(
                bottle.chemical.name.clone(),
                bottle.volume_remaining,
                bottle.chemical.color.clone(),
            )];
            self.recompute_total();
        }
    }

    pub fn substance_names(&self) -> Vec<String> {
        self.contents.iter().map(|c| c.name.clone()).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct LabState {
    pub tick: u64,
    pub containers: Vec<Container>,
    pub reactions: Vec<ReactionRecord>,
    pub alerts: Vec<SafetyAlert>,
    pub experiment: ExperimentState,
    /// Events since the last log row.
    pub events: Vec<LabEvent>,
    pub notices: Vec<Notice>,
    /// Bumped on every successful mutation; drives snapshot writes.
    pub revision: u64,
}

impl LabState {
    pub fn container(&self, id: &str) -> Option<&Container> {
        self.containers.iter().find(|c| c.id == id)
    }

    pub fn container_index(&self, id: &str) -> Option<usize> {
        self.containers.iter().position(|c| c.id == id)
    }
}

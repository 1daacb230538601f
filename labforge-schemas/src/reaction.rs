use serde::{Deserialize, Serialize};

pub const TYPE_COMBUSTION: &str = "combustion";
pub const TYPE_SINGLE_REPLACEMENT: &str = "single_replacement";
pub const TYPE_ACID_BASE: &str = "acid_base";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorChange {
    pub from: String,
    pub to: String,
}

/// One entry of the local reaction table.
///
/// The table is keyed by the unordered pair in `reactants`; an entry only
/// matches when the mixture is at least `temperature_required` degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionRule {
    pub id: String,
    pub name: String,
    /// Substance identifiers (formula or name) of the two reactants.
    pub reactants: [String; 2],
    #[serde(default)]
    pub products: Vec<String>,
    #[serde(rename = "type")]
    pub reaction_type: String,
    /// "exothermic" / "endothermic".
    #[serde(default)]
    pub energy: String,
    #[serde(default)]
    pub temperature_required: f64,
    #[serde(default)]
    pub catalysts: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<String>,
    /// Heat released, kJ/mol.
    #[serde(default)]
    pub heat_generated: f64,
    #[serde(default)]
    pub color_change: Option<ColorChange>,
    #[serde(default)]
    pub gas_evolution: Option<String>,
    #[serde(default)]
    pub precipitate_formed: Option<String>,
    #[serde(default)]
    pub danger_level: String,
    #[serde(default)]
    pub safety_warnings: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub balanced_equation: String,
    #[serde(default)]
    pub educational_notes: Vec<String>,
    /// Name of the single substance the mixture collapses into.
    #[serde(default)]
    pub output_chemical: Option<String>,
    #[serde(default)]
    pub output_color: Option<String>,
    #[serde(default)]
    pub final_temperature: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionProduct {
    pub name: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub color: String,
}

/// Where a resolved outcome came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutcomeSource {
    Remote,
    LocalTable,
}

/// The normalized result of resolving a reaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionOutcome {
    pub reaction_name: String,
    #[serde(default)]
    pub equation: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub reaction_type: String,
    pub reacts: bool,
    #[serde(default)]
    pub products: Vec<ReactionProduct>,
    #[serde(default)]
    pub output_chemical: Option<String>,
    #[serde(default)]
    pub output_volume: f64,
    #[serde(default)]
    pub final_color: Option<String>,
    #[serde(default)]
    pub final_temperature: Option<f64>,
    #[serde(default)]
    pub gas: Option<String>,
    #[serde(default)]
    pub precipitate: Option<String>,
    #[serde(default)]
    pub danger: Option<String>,
    #[serde(default)]
    pub safety_level: Option<String>,
    /// Heat units released by the reaction.
    #[serde(default)]
    pub energy: f64,
    #[serde(default)]
    pub color_change: Option<ColorChange>,
    pub source: OutcomeSource,
}

impl ReactionOutcome {
    pub fn is_combustion(&self) -> bool {
        self.reaction_type.eq_ignore_ascii_case(TYPE_COMBUSTION)
    }

    pub fn is_displacement(&self) -> bool {
        self.reaction_type.eq_ignore_ascii_case(TYPE_SINGLE_REPLACEMENT)
            || self.reaction_name.to_ascii_lowercase().contains("displacement")
    }
}

/// Entry of the append-only reaction history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionRecord {
    pub equipment_id: String,
    pub outcome: ReactionOutcome,
    pub tick: u64,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

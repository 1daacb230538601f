use crate::equipment::Position;
use serde::{Deserialize, Serialize};

/// The pour-control shortcut buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuickAmount {
    #[serde(rename = "10ml")]
    Ml10,
    #[serde(rename = "25ml")]
    Ml25,
    #[serde(rename = "50ml")]
    Ml50,
    #[serde(rename = "100ml")]
    Ml100,
}

impl QuickAmount {
    pub fn millilitres(self) -> f64 {
        match self {
            Self::Ml10 => 10.0,
            Self::Ml25 => 25.0,
            Self::Ml50 => 50.0,
            Self::Ml100 => 100.0,
        }
    }
}

/// One user action against the bench, as recorded in a lab script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LabCommand {
    StartExperiment,
    PauseExperiment,
    ResumeExperiment,
    CompleteExperiment,
    ResetLab,
    /// Places equipment from the rack. `substance` names the chemical when
    /// `equipment` is a bottle. `label` lets later steps refer to the piece.
    Place {
        equipment: String,
        position: Position,
        #[serde(default)]
        substance: Option<String>,
        #[serde(default)]
        label: Option<String>,
    },
    Move {
        container: String,
        position: Position,
    },
    Remove {
        container: String,
    },
    AddChemical {
        container: String,
        substance: String,
        volume_ml: f64,
    },
    Pour {
        bottle: String,
        target: String,
        amount_ml: f64,
    },
    QuickPour {
        bottle: String,
        target: String,
        amount: QuickAmount,
    },
    SelectBottle {
        bottle: String,
    },
    SetVolume {
        container: String,
        volume_ml: f64,
    },
    SetHeated {
        container: String,
        heated: bool,
    },
    /// Lets simulated time pass.
    Wait {
        seconds: u64,
    },
    ClearAlerts,
}

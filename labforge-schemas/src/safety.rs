use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Warning,
    Danger,
    Critical,
}

/// An advisory raised by the safety monitor. Alerts never block the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyAlert {
    pub id: String,
    pub level: AlertLevel,
    pub message: String,
    #[serde(default)]
    pub chemical: Option<String>,
    pub action: String,
    pub timestamp: DateTime<Utc>,
}

/// Keywords that, when all present in a mixture, make it dangerous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncompatibleCombination {
    pub chemicals: Vec<String>,
    pub warning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureLimit {
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub ignition: Option<f64>,
    pub warning: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SafetyRules {
    #[serde(default)]
    pub incompatible_combinations: Vec<IncompatibleCombination>,
    /// Keyed by the substance keyword the limit applies to.
    #[serde(default)]
    pub temperature_limits: BTreeMap<String, TemperatureLimit>,
}

impl SafetyRules {
    /// The rules every bench ships with.
    pub fn builtin() -> Self {
        let mut temperature_limits = BTreeMap::new();
        temperature_limits.insert(
            "H2SO4".to_string(),
            TemperatureLimit {
                max: Some(80.0),
                ignition: None,
                warning: "Sulfuric acid becomes more reactive at high temperatures".to_string(),
            },
        );
        temperature_limits.insert(
            "HCl".to_string(),
            TemperatureLimit {
                max: Some(85.0),
                ignition: None,
                warning: "HCl vapor pressure increases rapidly".to_string(),
            },
        );
        temperature_limits.insert(
            "Mg".to_string(),
            TemperatureLimit {
                max: None,
                ignition: Some(650.0),
                warning: "Magnesium ignition temperature exceeded!".to_string(),
            },
        );

        Self {
            incompatible_combinations: vec![IncompatibleCombination {
                chemicals: vec!["H2SO4".to_string(), "organic".to_string()],
                warning: "DANGER: Sulfuric acid reacts explosively with organic compounds"
                    .to_string(),
            }],
            temperature_limits,
        }
    }

    /// Adds `other`'s rules; limits with the same key are replaced.
    pub fn merge(&mut self, other: SafetyRules) {
        self.incompatible_combinations
            .extend(other.incompatible_combinations);
        self.temperature_limits.extend(other.temperature_limits);
    }
}

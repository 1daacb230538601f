//! Reference data for chemicals and the measured amounts of them that move
//! between bottles and containers on the bench.

use serde::{Deserialize, Serialize};

/// Display color used when neither the catalog nor the caller supplies one.
pub const DEFAULT_CHEMICAL_COLOR: &str = "#87CEEB";

/// A chemical as served by the chemicals data source.
///
/// Records are read-only reference data: the simulation never mutates them.
/// Field names follow the data source's camelCase layout so the same record
/// can be read from a JSON dump or a YAML knowledge-base file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Substance {
    /// Display name, e.g. "Hydrochloric Acid".
    pub name: String,
    /// Molecular formula, e.g. "HCl". Used as the identifier when present.
    #[serde(default)]
    pub formula: String,
    #[serde(default = "default_color")]
    pub color: String,
    /// Physical state at room temperature ("liquid", "solid", "gas").
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub danger_level: String,
    #[serde(default)]
    pub molar_mass: f64,
    #[serde(default)]
    pub density: Option<f64>,
    #[serde(default)]
    pub boiling_point: Option<f64>,
    #[serde(default)]
    pub melting_point: Option<f64>,
    #[serde(default, rename = "pH")]
    pub ph: Option<f64>,
    #[serde(default)]
    pub reacts_with: Vec<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub hazards: Vec<String>,
    #[serde(default)]
    pub concentration: Option<f64>,
}

fn default_color() -> String {
    DEFAULT_CHEMICAL_COLOR.to_string()
}

impl Substance {
    /// Identifier used for rule lookups: the formula when known, else the name.
    pub fn identifier(&self) -> &str {
        if self.formula.trim().is_empty() {
            &self.name
        } else {
            &self.formula
        }
    }
}

/// A measured amount of one substance inside a container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChemicalQuantity {
    pub name: String,
    /// Volume in mL. Never negative once inside the engine.
    #[serde(default)]
    pub volume: f64,
    #[serde(default = "default_color")]
    pub color: String,
}

impl ChemicalQuantity {
    pub fn new(name: impl Into<String>, volume: f64, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            volume: sanitize_volume(volume),
            color: color.into(),
        }
    }
}

/// The substance bound to a bottle, at a fixed concentration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BottleChemical {
    pub name: String,
    #[serde(default)]
    pub formula: String,
    #[serde(default = "default_color")]
    pub color: String,
    /// Molarity of the stock solution.
    #[serde(default = "default_concentration")]
    pub concentration: f64,
}

fn default_concentration() -> f64 {
    1.0
}

impl From<&Substance> for BottleChemical {
    fn from(substance: &Substance) -> Self {
        Self {
            name: substance.name.clone(),
            formula: substance.formula.clone(),
            color: substance.color.clone(),
            concentration: substance.concentration.unwrap_or_else(default_concentration),
        }
    }
}

/// Maps non-finite and negative volumes to zero.
pub fn sanitize_volume(volume: f64) -> f64 {
    if volume.is_finite() && volume > 0.0 {
        volume
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substance_reads_data_source_layout() {
        let json = r##"{
            "name": "Hydrochloric Acid",
            "formula": "HCl",
            "color": "#FFD700",
            "state": "liquid",
            "dangerLevel": "high",
            "molarMass": 36.46,
            "pH": 1.0,
            "reactsWith": ["NaOH"],
            "category": "acid",
            "hazards": ["corrosive"]
        }"##;
        let substance: Substance = serde_json::from_str(json).unwrap();
        assert_eq!(substance.identifier(), "HCl");
        assert_eq!(substance.ph, Some(1.0));
        assert_eq!(substance.danger_level, "high");
        assert!(substance.density.is_none());
    }

    #[test]
    fn identifier_falls_back_to_name() {
        let substance: Substance = serde_json::from_str(r#"{"name": "Vinegar"}"#).unwrap();
        assert_eq!(substance.identifier(), "Vinegar");
        assert_eq!(substance.color, DEFAULT_CHEMICAL_COLOR);
    }

    #[test]
    fn quantity_volume_is_sanitized() {
        assert_eq!(ChemicalQuantity::new("x", f64::NAN, "#fff").volume, 0.0);
        assert_eq!(ChemicalQuantity::new("x", -3.0, "#fff").volume, 0.0);
        assert_eq!(ChemicalQuantity::new("x", 12.5, "#fff").volume, 12.5);
    }
}

//! Read-only lookup over the chemicals reference data.

use labforge_schemas::chemical::{Substance, DEFAULT_CHEMICAL_COLOR};
use std::collections::HashMap;

/// Substances indexed by lowercase name and formula.
#[derive(Debug, Clone, Default)]
pub struct SubstanceCatalog {
    substances: Vec<Substance>,
    index: HashMap<String, usize>,
}

impl SubstanceCatalog {
    pub fn new(substances: Vec<Substance>) -> Self {
        let mut catalog = Self::default();
        for substance in substances {
            catalog.insert(substance);
        }
        catalog
    }

    /// A small set of bench chemicals, used when no knowledge base is loaded.
    pub fn builtin() -> Self {
        Self::new(vec![
            reagent("Hydrochloric Acid", "HCl", "#FFD700", "acid", Some(1.0), Some(1.18)),
            reagent("Sodium Hydroxide", "NaOH", "#87CEEB", "base", Some(13.0), Some(1.52)),
            reagent("Sulfuric Acid", "H2SO4", "#FFFF99", "acid", Some(0.5), Some(1.83)),
            reagent("Copper Sulfate", "CuSO4", "#4169E1", "salt", Some(4.0), Some(1.1)),
            reagent("Iron", "Fe", "#A19D94", "metal", None, Some(7.87)),
            reagent("Potassium Permanganate", "KMnO4", "#800080", "oxidizer", Some(2.0), Some(1.03)),
            reagent("Silver Nitrate", "AgNO3", "#F5F5F5", "salt", Some(6.0), Some(1.05)),
            reagent("Sodium Chloride", "NaCl", "#FFFFFF", "salt", Some(7.0), Some(1.2)),
            reagent("Sodium Bicarbonate", "NaHCO3", "#FAFAFA", "base", Some(8.3), Some(1.05)),
            reagent("Acetic Acid", "CH3COOH", "#F0F8FF", "organic", Some(2.4), Some(1.05)),
            reagent("Ethanol", "C2H5OH", "#F8F8FF", "organic", Some(7.3), Some(0.79)),
            reagent("Magnesium", "Mg", "#C0C0C0", "metal", None, Some(1.74)),
            reagent("Water", "H2O", "#E0F7FF", "solvent", Some(7.0), Some(1.0)),
        ])
    }

    fn insert(&mut self, substance: Substance) {
        let slot = self.substances.len();
        self.index.insert(substance.name.to_lowercase(), slot);
        if !substance.formula.trim().is_empty() {
            self.index
                .entry(substance.formula.to_lowercase())
                .or_insert(slot);
        }
        self.substances.push(substance);
    }

    /// Case-insensitive lookup by name or formula.
    pub fn get(&self, name: &str) -> Option<&Substance> {
        self.index
            .get(&name.trim().to_lowercase())
            .map(|&slot| &self.substances[slot])
    }

    pub fn substances(&self) -> &[Substance] {
        &self.substances
    }

    pub fn len(&self) -> usize {
        self.substances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.substances.is_empty()
    }

    /// The rule-table identifier for a display name.
    pub fn identifier(&self, name: &str) -> String {
        self.get(name)
            .map(|s| s.identifier().to_string())
            .unwrap_or_else(|| name.to_string())
    }

    pub fn color_for(&self, name: &str) -> String {
        self.get(name)
            .map(|s| s.color.clone())
            .unwrap_or_else(|| DEFAULT_CHEMICAL_COLOR.to_string())
    }

    /// Text the safety rules match against: name, formula and category.
    pub fn descriptor(&self, name: &str) -> String {
        match self.get(name) {
            Some(s) => format!("{} | {} | {}", s.name, s.formula, s.category),
            None => name.to_string(),
        }
    }

    pub fn ph_of(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|s| s.ph).filter(|ph| ph.is_finite())
    }

    pub fn density_of(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|s| s.density).filter(|d| d.is_finite())
    }
}

fn reagent(
    name: &str,
    formula: &str,
    color: &str,
    category: &str,
    ph: Option<f64>,
    density: Option<f64>,
) -> Substance {
    Substance {
        name: name.to_string(),
        formula: formula.to_string(),
        color: color.to_string(),
        state: "liquid".to_string(),
        danger_level: String::new(),
        molar_mass: 0.0,
        density,
        boiling_point: None,
        melting_point: None,
        ph,
        reacts_with: Vec::new(),
        category: category.to_string(),
        hazards: Vec::new(),
        concentration: Some(1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive_by_name_and_formula() {
        let catalog = SubstanceCatalog::builtin();
        assert_eq!(catalog.identifier("hydrochloric acid"), "HCl");
        assert_eq!(catalog.get("naoh").map(|s| s.name.as_str()), Some("Sodium Hydroxide"));
    }

    #[test]
    fn unknown_names_pass_through() {
        let catalog = SubstanceCatalog::builtin();
        assert_eq!(catalog.identifier("Mystery Goo"), "Mystery Goo");
        assert_eq!(catalog.color_for("Mystery Goo"), DEFAULT_CHEMICAL_COLOR);
        assert_eq!(catalog.descriptor("Mystery Goo"), "Mystery Goo");
    }

    #[test]
    fn descriptor_carries_category() {
        let catalog = SubstanceCatalog::builtin();
        assert!(catalog.descriptor("Ethanol").contains("organic"));
    }
}

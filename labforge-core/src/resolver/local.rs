//! Deterministic fallback table keyed by the unordered reactant pair.

use labforge_schemas::reaction::{
    ColorChange, OutcomeSource, ReactionOutcome, ReactionProduct, ReactionRule, TYPE_ACID_BASE,
    TYPE_SINGLE_REPLACEMENT,
};
use std::collections::HashMap;

type PairKey = (String, String);

fn pair_key(a: &str, b: &str) -> PairKey {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReactionTable {
    entries: HashMap<PairKey, Vec<ReactionRule>>,
}

impl ReactionTable {
    pub fn new(rules: impl IntoIterator<Item = ReactionRule>) -> Self {
        let mut table = Self::default();
        for rule in rules {
            table.insert(rule);
        }
        table
    }

    /// Adds a rule. A rule with the same id under the same pair is replaced.
    pub fn insert(&mut self, rule: ReactionRule) {
        let key = pair_key(&rule.reactants[0], &rule.reactants[1]);
        let bucket = self.entries.entry(key).or_default();
        match bucket.iter_mut().find(|r| r.id == rule.id) {
            Some(existing) => *existing = rule,
            None => bucket.push(rule),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn rules(&self) -> impl Iterator<Item = &ReactionRule> {
        self.entries.values().flatten()
    }

    /// Finds the first rule for any pairing of the candidate identifiers
    /// that the mixture is warm enough to trigger.
    pub fn lookup(&self, candidates_a: &[&str], candidates_b: &[&str], temperature: f64) -> Option<&ReactionRule> {
        for a in candidates_a {
            for b in candidates_b {
                let Some(bucket) = self.entries.get(&pair_key(a, b)) else {
                    continue;
                };
                if let Some(rule) = bucket.iter().find(|r| temperature >= r.temperature_required) {
                    return Some(rule);
                }
            }
        }
        None
    }

    /// The rules every bench ships with.
    pub fn builtin() -> Self {
        Self::new(vec![
            ReactionRule {
                id: "hcl_naoh_neutralization".to_string(),
                name: "Acid-Base Neutralization".to_string(),
                reactants: ["HCl".to_string(), "NaOH".to_string()],
                products: vec!["NaCl".to_string(), "H2O".to_string()],
                reaction_type: TYPE_ACID_BASE.to_string(),
                energy: "exothermic".to_string(),
                temperature_required: 20.0,
                catalysts: Vec::new(),
                conditions: vec!["aqueous solution".to_string()],
                heat_generated: 57.3,
                color_change: None,
                gas_evolution: None,
                precipitate_formed: None,
                danger_level: "medium".to_string(),
                safety_warnings: vec!["Generates heat".to_string()],
                description: "Strong acid neutralizes strong base, forming salt and water".to_string(),
                balanced_equation: "HCl + NaOH → NaCl + H2O".to_string(),
                educational_notes: vec![
                    "Classic neutralization; the enthalpy is about -57.3 kJ/mol".to_string(),
                ],
                output_chemical: Some("Sodium Chloride Solution".to_string()),
                output_color: Some("#F0F8FF".to_string()),
                final_temperature: None,
            },
            ReactionRule {
                id: "cuso4_fe_displacement".to_string(),
                name: "Copper Displacement".to_string(),
                reactants: ["CuSO4".to_string(), "Fe".to_string()],
                products: vec!["FeSO4".to_string(), "Cu".to_string()],
                reaction_type: TYPE_SINGLE_REPLACEMENT.to_string(),
                energy: "exothermic".to_string(),
                temperature_required: 15.0,
                catalysts: Vec::new(),
                conditions: vec!["aqueous solution".to_string()],
                heat_generated: 15.0,
                color_change: Some(ColorChange {
                    from: "#4169E1".to_string(),
                    to: "#90EE90".to_string(),
                }),
                gas_evolution: None,
                precipitate_formed: Some("Cu".to_string()),
                danger_level: "low".to_string(),
                safety_warnings: Vec::new(),
                description: "Iron displaces copper from solution; copper deposits on the metal".to_string(),
                balanced_equation: "CuSO4 + Fe → FeSO4 + Cu".to_string(),
                educational_notes: vec!["Iron sits above copper in the reactivity series".to_string()],
                output_chemical: Some("Iron(II) Sulfate Solution".to_string()),
                output_color: Some("#90EE90".to_string()),
                final_temperature: None,
            },
            ReactionRule {
                id: "agno3_nacl_precipitation".to_string(),
                name: "Silver Chloride Precipitation".to_string(),
                reactants: ["AgNO3".to_string(), "NaCl".to_string()],
                products: vec!["AgCl".to_string(), "NaNO3".to_string()],
                reaction_type: "double_replacement".to_string(),
                energy: "exothermic".to_string(),
                temperature_required: 0.0,
                catalysts: Vec::new(),
                conditions: vec!["aqueous solution".to_string()],
                heat_generated: 6.5,
                color_change: Some(ColorChange {
                    from: "#F8F8FF".to_string(),
                    to: "#F5F5F5".to_string(),
                }),
                gas_evolution: None,
                precipitate_formed: Some("AgCl".to_string()),
                danger_level: "low".to_string(),
                safety_warnings: vec!["Silver nitrate stains skin".to_string()],
                description: "White silver chloride precipitates out of solution".to_string(),
                balanced_equation: "AgNO3 + NaCl → AgCl↓ + NaNO3".to_string(),
                educational_notes: vec!["Standard test for chloride ions".to_string()],
                output_chemical: Some("Silver Chloride Suspension".to_string()),
                output_color: Some("#F5F5F5".to_string()),
                final_temperature: None,
            },
            ReactionRule {
                id: "nahco3_ch3cooh_effervescence".to_string(),
                name: "Baking Soda and Vinegar".to_string(),
                reactants: ["NaHCO3".to_string(), "CH3COOH".to_string()],
                products: vec!["CH3COONa".to_string(), "H2O".to_string(), "CO2".to_string()],
                reaction_type: TYPE_ACID_BASE.to_string(),
                energy: "endothermic".to_string(),
                temperature_required: 0.0,
                catalysts: Vec::new(),
                conditions: Vec::new(),
                heat_generated: 0.0,
                color_change: None,
                gas_evolution: Some("CO2".to_string()),
                precipitate_formed: None,
                danger_level: "low".to_string(),
                safety_warnings: Vec::new(),
                description: "Carbon dioxide bubbles out as the bicarbonate is neutralized".to_string(),
                balanced_equation: "NaHCO3 + CH3COOH → CH3COONa + H2O + CO2↑".to_string(),
                educational_notes: vec!["The mixture cools slightly while it fizzes".to_string()],
                output_chemical: Some("Sodium Acetate Solution".to_string()),
                output_color: Some("#FFFFFF".to_string()),
                final_temperature: None,
            },
            ReactionRule {
                id: "mg_hcl_hydrogen".to_string(),
                name: "Magnesium in Acid".to_string(),
                reactants: ["Mg".to_string(), "HCl".to_string()],
                products: vec!["MgCl2".to_string(), "H2".to_string()],
                reaction_type: TYPE_SINGLE_REPLACEMENT.to_string(),
                energy: "exothermic".to_string(),
                temperature_required: 0.0,
                catalysts: Vec::new(),
                conditions: Vec::new(),
                heat_generated: 92.0,
                color_change: None,
                gas_evolution: Some("H2".to_string()),
                precipitate_formed: None,
                danger_level: "high".to_string(),
                safety_warnings: vec!["Flammable hydrogen gas is released".to_string()],
                description: "Magnesium dissolves vigorously, releasing hydrogen".to_string(),
                balanced_equation: "Mg + 2HCl → MgCl2 + H2↑".to_string(),
                educational_notes: vec!["Keep open flames away from the evolving gas".to_string()],
                output_chemical: Some("Magnesium Chloride Solution".to_string()),
                output_color: Some("#F8F8FF".to_string()),
                final_temperature: None,
            },
        ])
    }
}

/// Converts a table rule into an outcome carrying `output_volume`.
pub fn rule_to_outcome(rule: &ReactionRule, output_volume: f64) -> ReactionOutcome {
    let danger = (!rule.safety_warnings.is_empty()).then(|| rule.safety_warnings.join("; "));
    ReactionOutcome {
        reaction_name: rule.name.clone(),
        equation: rule.balanced_equation.clone(),
        description: rule.description.clone(),
        reaction_type: rule.reaction_type.clone(),
        reacts: true,
        products: rule
            .products
            .iter()
            .map(|name| ReactionProduct {
                name: name.clone(),
                state: String::new(),
                color: String::new(),
            })
            .collect(),
        output_chemical: rule.output_chemical.clone(),
        output_volume,
        final_color: rule
            .output_color
            .clone()
            .or_else(|| rule.color_change.as_ref().map(|c| c.to.clone())),
        final_temperature: rule.final_temperature,
        gas: rule.gas_evolution.clone(),
        precipitate: rule.precipitate_formed.clone(),
        danger,
        safety_level: (!rule.danger_level.is_empty()).then(|| rule.danger_level.clone()),
        energy: rule.heat_generated,
        color_change: rule.color_change.clone(),
        source: OutcomeSource::LocalTable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_unordered_and_case_insensitive() {
        let table = ReactionTable::builtin();
        let forward = table.lookup(&["hcl"], &["NaOH"], 25.0).map(|r| r.id.as_str());
        let backward = table.lookup(&["NAOH"], &["HCl"], 25.0).map(|r| r.id.as_str());
        assert_eq!(forward, Some("hcl_naoh_neutralization"));
        assert_eq!(forward, backward);
    }

    #[test]
    fn cold_mixture_does_not_trigger() {
        let table = ReactionTable::builtin();
        assert!(table.lookup(&["HCl"], &["NaOH"], 19.9).is_none());
        assert!(table.lookup(&["HCl"], &["NaOH"], 20.0).is_some());
    }

    #[test]
    fn any_candidate_pairing_matches() {
        let table = ReactionTable::builtin();
        let rule = table.lookup(
            &["Hydrochloric Acid", "HCl"],
            &["Sodium Hydroxide", "NaOH"],
            20.0,
        );
        assert!(rule.is_some());
    }

    #[test]
    fn insert_replaces_rule_with_same_id() {
        let mut table = ReactionTable::builtin();
        let before = table.len();
        let mut rule = table
            .lookup(&["HCl"], &["NaOH"], 20.0)
            .cloned()
            .unwrap();
        rule.heat_generated = 10.0;
        table.insert(rule);
        assert_eq!(table.len(), before);
        assert_eq!(table.lookup(&["HCl"], &["NaOH"], 20.0).unwrap().heat_generated, 10.0);
    }

    #[test]
    fn outcome_takes_energy_and_output_from_rule() {
        let table = ReactionTable::builtin();
        let rule = table.lookup(&["HCl"], &["NaOH"], 20.0).unwrap();
        let outcome = rule_to_outcome(rule, 100.0);
        assert_eq!(outcome.reaction_name, "Acid-Base Neutralization");
        assert_eq!(outcome.energy, 57.3);
        assert_eq!(outcome.output_volume, 100.0);
        assert_eq!(outcome.output_chemical.as_deref(), Some("Sodium Chloride Solution"));
        assert_eq!(outcome.source, OutcomeSource::LocalTable);
    }
}

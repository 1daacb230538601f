use crate::{
    command::LabCommand, reaction::ReactionRule, safety::SafetyRules, chemical::Substance,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SubstanceFile {
    pub schema_version: String,
    pub substances: Vec<Substance>,
}

#[derive(Debug, Deserialize)]
pub struct ReactionRuleFile {
    pub schema_version: String,
    pub reactions: Vec<ReactionRule>,
}

#[derive(Debug, Deserialize)]
pub struct SafetyRuleFile {
    pub schema_version: String,
    pub safety: SafetyRules,
}

#[derive(Debug, Deserialize)]
pub struct LabScriptFile {
    pub schema_version: String,
    #[serde(default)]
    pub name: Option<String>,
    pub steps: Vec<LabCommand>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::QuickAmount;

    #[test]
    fn lab_script_parses_tagged_steps() {
        let yaml = r#"
schema_version: "1.0"
name: neutralization
steps:
  - type: start_experiment
  - type: place
    equipment: beaker-250
    position: [0.0, 0.0, 0.0]
    label: beaker
  - type: quick_pour
    bottle: hcl
    target: beaker
    amount: 50ml
  - type: wait
    seconds: 6
"#;
        let script: LabScriptFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(script.steps.len(), 4);
        assert_eq!(script.steps[0], LabCommand::StartExperiment);
        match &script.steps[2] {
            LabCommand::QuickPour { amount, .. } => assert_eq!(*amount, QuickAmount::Ml50),
            other => panic!("unexpected step {other:?}"),
        }
    }

    #[test]
    fn reaction_rule_file_parses() {
        let yaml = r#"
schema_version: "1.0"
reactions:
  - id: hcl_naoh_neutralization
    name: Acid-Base Neutralization
    reactants: [HCl, NaOH]
    products: [NaCl, H2O]
    type: acid_base
    temperatureRequired: 20
    heatGenerated: 57.3
    outputChemical: Sodium Chloride Solution
"#;
        let file: ReactionRuleFile = serde_yaml::from_str(yaml).unwrap();
        let rule = &file.reactions[0];
        assert_eq!(rule.reactants, ["HCl".to_string(), "NaOH".to_string()]);
        assert_eq!(rule.heat_generated, 57.3);
        assert!(rule.color_change.is_none());
    }
}

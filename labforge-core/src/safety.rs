//! Advisory safety checks. Nothing here changes the chemistry.

use chrono::Utc;
use labforge_schemas::{
    reaction::ReactionOutcome,
    safety::{AlertLevel, SafetyAlert, SafetyRules},
};

pub const ACTION_STOP: &str = "STOP IMMEDIATELY";
pub const ACTION_EVACUATE: &str = "EVACUATE IMMEDIATELY";
pub const ACTION_COOL_DOWN: &str = "Cool down mixture";

#[derive(Debug, Clone)]
pub struct SafetyMonitor {
    rules: SafetyRules,
}

impl Default for SafetyMonitor {
    fn default() -> Self {
        Self::new(SafetyRules::builtin())
    }
}

impl SafetyMonitor {
    pub fn new(rules: SafetyRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &SafetyRules {
        &self.rules
    }

    /// Checks the mixture against every rule; all matching rules fire.
    ///
    /// Each entry of `substances` is the text a keyword is searched in,
    /// typically "name | formula | category". A keyword must appear as a
    /// whole word, ignoring case.
    pub fn check(&self, substances: &[String], temperature: f64) -> Vec<SafetyAlert> {
        let mut alerts = Vec::new();

        for combo in &self.rules.incompatible_combinations {
            let all_present = !combo.chemicals.is_empty()
                && combo
                    .chemicals
                    .iter()
                    .all(|keyword| substances.iter().any(|s| mentions(s, keyword)));
            if all_present {
                alerts.push(alert(
                    AlertLevel::Critical,
                    combo.warning.clone(),
                    None,
                    ACTION_STOP,
                ));
            }
        }

        if !temperature.is_finite() {
            return alerts;
        }

        for substance in substances {
            for (keyword, limits) in &self.rules.temperature_limits {
                if !mentions(substance, keyword) {
                    continue;
                }
                if limits.max.is_some_and(|max| temperature > max) {
                    alerts.push(alert(
                        AlertLevel::Danger,
                        limits.warning.clone(),
                        Some(keyword.clone()),
                        ACTION_COOL_DOWN,
                    ));
                }
                if limits.ignition.is_some_and(|ignition| temperature > ignition) {
                    alerts.push(alert(
                        AlertLevel::Critical,
                        format!("{keyword} ignition threshold exceeded!"),
                        Some(keyword.clone()),
                        ACTION_EVACUATE,
                    ));
                }
            }
        }

        alerts
    }
}

/// Turns the `danger` note of a resolved reaction into an alert, if any.
pub fn alert_from_outcome(outcome: &ReactionOutcome) -> Option<SafetyAlert> {
    let danger = outcome.danger.as_deref()?.trim();
    if danger.is_empty() || danger.eq_ignore_ascii_case("none") {
        return None;
    }
    let level = match outcome
        .safety_level
        .as_deref()
        .map(|s| s.trim().to_ascii_lowercase())
        .as_deref()
    {
        Some("critical") | Some("explosive") => AlertLevel::Critical,
        Some("danger") | Some("dangerous") | Some("high") => AlertLevel::Danger,
        _ => AlertLevel::Warning,
    };
    Some(alert(
        level,
        danger.to_string(),
        outcome.output_chemical.clone(),
        "Follow lab safety procedures",
    ))
}

/// True when `keyword` occurs in `text` with no letter or digit directly on
/// either side.
fn mentions(text: &str, keyword: &str) -> bool {
    let text = text.to_lowercase();
    let keyword = keyword.trim().to_lowercase();
    if keyword.is_empty() {
        return false;
    }
    text.match_indices(&keyword).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let after = text[start + keyword.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

fn alert(level: AlertLevel, message: String, chemical: Option<String>, action: &str) -> SafetyAlert {
    SafetyAlert {
        id: uuid::Uuid::new_v4().to_string(),
        level,
        message,
        chemical,
        action: action.to_string(),
        timestamp: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labforge_schemas::reaction::OutcomeSource;

    fn descriptors(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn incompatible_pair_raises_critical_stop() {
        let monitor = SafetyMonitor::default();
        let alerts = monitor.check(
            &descriptors(&["Sulfuric Acid | H2SO4 | acid", "Ethanol | C2H5OH | organic"]),
            20.0,
        );
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, AlertLevel::Critical);
        assert_eq!(alerts[0].action, ACTION_STOP);
    }

    #[test]
    fn temperature_limits_fire_independently() {
        let monitor = SafetyMonitor::default();
        let alerts = monitor.check(
            &descriptors(&["Hydrochloric Acid | HCl | acid", "Magnesium | Mg | metal"]),
            700.0,
        );
        let levels: Vec<_> = alerts.iter().map(|a| a.level).collect();
        assert_eq!(levels, vec![AlertLevel::Danger, AlertLevel::Critical]);
        assert_eq!(alerts[1].action, ACTION_EVACUATE);
    }

    #[test]
    fn keywords_match_whole_words_only() {
        let monitor = SafetyMonitor::default();
        let alerts = monitor.check(
            &descriptors(&["Sulfuric Acid | H2SO4 | acid", "Sodium Chloride | NaCl | inorganic"]),
            20.0,
        );
        assert!(alerts.is_empty());

        assert!(mentions("Ethanol | C2H5OH | Organic", "organic"));
        assert!(mentions("Sulfuric Acid | H2SO4 | acid", "h2so4"));
        assert!(!mentions("Sodium Chloride | NaCl | inorganic", "organic"));
        assert!(!mentions("anything", "  "));
    }

    #[test]
    fn cool_mixture_raises_nothing() {
        let monitor = SafetyMonitor::default();
        let alerts = monitor.check(&descriptors(&["Hydrochloric Acid | HCl | acid"]), 25.0);
        assert!(alerts.is_empty());
    }

    #[test]
    fn outcome_danger_maps_to_alert_level() {
        let outcome = ReactionOutcome {
            reaction_name: "Thermite".to_string(),
            equation: String::new(),
            description: String::new(),
            reaction_type: "redox".to_string(),
            reacts: true,
            products: Vec::new(),
            output_chemical: None,
            output_volume: 0.0,
            final_color: None,
            final_temperature: None,
            gas: None,
            precipitate: None,
            danger: Some("Extremely hot".to_string()),
            safety_level: Some("Dangerous".to_string()),
            energy: 0.0,
            color_change: None,
            source: OutcomeSource::Remote,
        };
        let alert = alert_from_outcome(&outcome).unwrap();
        assert_eq!(alert.level, AlertLevel::Danger);

        let calm = ReactionOutcome {
            danger: Some("none".to_string()),
            ..outcome
        };
        assert!(alert_from_outcome(&calm).is_none());
    }
}

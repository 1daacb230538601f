use crate::error::LabError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Tunables for the bench. Every field has a default, so a config file only
/// needs the keys it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabConfig {
    /// Half extent of the bench top along x.
    pub bench_half_width: f64,
    /// Half extent of the bench top along z.
    pub bench_half_depth: f64,
    /// Minimum x/z distance between two placed pieces.
    pub min_spacing: f64,
    pub bottle_capacity_ml: f64,
    pub refill_cooldown_secs: u64,
    /// mL lost per second by a heated container.
    pub evaporation_rate_ml_per_sec: f64,
    pub ambient_temperature: f64,
    /// Degrees added by a lit burner.
    pub burner_heat: f64,
    /// Degrees of reaction heat shed per second.
    pub cooling_rate_per_sec: f64,
    pub auto_save_interval_secs: u64,
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            bench_half_width: 4.0,
            bench_half_depth: 2.0,
            min_spacing: 0.3,
            bottle_capacity_ml: 500.0,
            refill_cooldown_secs: 5,
            evaporation_rate_ml_per_sec: 0.5,
            ambient_temperature: 20.0,
            burner_heat: 40.0,
            cooling_rate_per_sec: 0.5,
            auto_save_interval_secs: 60,
        }
    }
}

impl LabConfig {
    pub fn from_yaml_file(path: &Path) -> Result<Self, LabError> {
        let display = path.display().to_string();
        let content =
            fs::read_to_string(path).map_err(|e| LabError::FileIO(display.clone(), e))?;
        let config: LabConfig =
            serde_yaml::from_str(&content).map_err(|e| LabError::YamlParsing(display, e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LabError> {
        let positive = [
            ("bench_half_width", self.bench_half_width),
            ("bench_half_depth", self.bench_half_depth),
            ("bottle_capacity_ml", self.bottle_capacity_ml),
        ];
        for (key, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(LabError::ConfigError(format!(
                    "{key} must be a positive number, got {value}"
                )));
            }
        }
        let non_negative = [
            ("min_spacing", self.min_spacing),
            ("evaporation_rate_ml_per_sec", self.evaporation_rate_ml_per_sec),
            ("burner_heat", self.burner_heat),
            ("cooling_rate_per_sec", self.cooling_rate_per_sec),
        ];
        for (key, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(LabError::ConfigError(format!(
                    "{key} must be zero or more, got {value}"
                )));
            }
        }
        if !self.ambient_temperature.is_finite() {
            return Err(LabError::ConfigError(
                "ambient_temperature must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config: LabConfig = serde_yaml::from_str("refill_cooldown_secs: 10\n").unwrap();
        assert_eq!(config.refill_cooldown_secs, 10);
        assert_eq!(config.bottle_capacity_ml, 500.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn negative_evaporation_is_rejected() {
        let config = LabConfig {
            evaporation_rate_ml_per_sec: -1.0,
            ..LabConfig::default()
        };
        assert!(matches!(config.validate(), Err(LabError::ConfigError(_))));
    }
}

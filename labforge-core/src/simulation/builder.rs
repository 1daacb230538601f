use crate::{
    catalog::SubstanceCatalog,
    config::LabConfig,
    effects::EffectDispatcher,
    error::LabError,
    logger::TimeSeriesLogger,
    safety::SafetyMonitor,
    scoring::Scoreboard,
    simulation::{engine::LabEngine, state::LabState},
};
use labforge_schemas::{chemical::Substance, safety::SafetyRules};
use std::collections::VecDeque;

/// A fluent builder for constructing a `LabEngine`.
///
/// Everything is optional: without a knowledge base the engine uses the
/// built-in substance catalog and safety rules.
#[derive(Default)]
pub struct LabBuilder {
    config: Option<LabConfig>,
    substances: Option<Vec<Substance>>,
    safety_rules: Option<SafetyRules>,
    user_id: Option<String>,
    log_path: Option<String>,
}

impl LabBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: LabConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replaces the built-in catalog with the given reference data.
    pub fn with_substances(mut self, substances: Vec<Substance>) -> Self {
        self.substances = Some(substances);
        self
    }

    /// Safety rules merged over the built-in ones.
    pub fn with_safety_rules(mut self, rules: SafetyRules) -> Self {
        self.safety_rules = Some(rules);
        self
    }

    /// Namespaces uploaded experiment summaries. Without it the bench runs
    /// in local-only mode and never auto-saves summaries.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Configures the engine to write time-series data to the specified CSV file.
    pub fn with_timeseries_logging_to_file(mut self, path: &str) -> Self {
        self.log_path = Some(path.to_string());
        self
    }

    /// # Errors
    ///
    /// Returns a `LabError` if the config is invalid or the log file cannot
    /// be created.
    pub fn build(self) -> Result<LabEngine, LabError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let catalog = match self.substances {
            Some(substances) if !substances.is_empty() => SubstanceCatalog::new(substances),
            _ => SubstanceCatalog::builtin(),
        };

        let mut rules = SafetyRules::builtin();
        if let Some(extra) = self.safety_rules {
            rules.merge(extra);
        }

        let logger = match self.log_path {
            Some(path) => Some(
                TimeSeriesLogger::new(&path).map_err(|e| LabError::FileIO(path.clone(), e))?,
            ),
            None => None,
        };

        Ok(LabEngine {
            state: LabState::default(),
            config,
            catalog,
            safety: SafetyMonitor::new(rules),
            effects: EffectDispatcher::new(),
            scoreboard: Scoreboard::default(),
            logger,
            pending: VecDeque::new(),
            next_ticket: 0,
            next_container: 0,
            user_id: self.user_id.filter(|id| !id.trim().is_empty()),
            last_auto_save: 0,
            selected_bottle: None,
        })
    }
}

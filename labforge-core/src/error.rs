use labforge_schemas::session::ExperimentStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LabError {
    #[error("Experiment is {0}; click Start to begin experimenting")]
    SessionInactive(ExperimentStatus),

    #[error("Cannot {action} an experiment that is {status}")]
    IllegalTransition {
        action: &'static str,
        status: ExperimentStatus,
    },

    #[error("Equipment '{0}' not found on the bench")]
    ContainerNotFound(String),

    #[error("'{0}' is not a chemical bottle")]
    NotABottle(String),

    #[error("'{0}' is not a valid target for this operation")]
    InvalidTarget(String),

    #[error("Amount must be a positive number of mL, got {0}")]
    InvalidAmount(f64),

    #[error("Insufficient volume: bottle only has {remaining}mL remaining ({requested}mL requested)")]
    InsufficientVolume { requested: f64, remaining: f64 },

    #[error("Bottle '{0}' is empty or refilling")]
    BottleEmpty(String),

    #[error("Position [{x:.2}, {z:.2}] is outside the bench")]
    OutOfBounds { x: f64, z: f64 },

    #[error("Position is occupied by '{0}'")]
    PositionOccupied(String),

    #[error("A {0} needs a chemical to hold")]
    MissingBottleChemical(String),

    #[error("Unknown equipment '{0}'")]
    UnknownEquipment(String),

    #[error("'{0}' holds no chemicals to adjust")]
    EmptyContainer(String),

    #[error("Unknown substance '{0}'")]
    UnknownSubstance(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error for file '{0}': {1}")]
    FileIO(String, #[source] std::io::Error),

    #[error("Failed to parse YAML from '{0}': {1}")]
    YamlParsing(String, #[source] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Failed to process CSV file '{0}': {1}")]
    CsvError(String, #[source] csv::Error),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("An error occurred during logging: {0}")]
    LoggingError(#[from] anyhow::Error),
}

impl LabError {
    /// Short title for the user-visible notice raised by this error.
    pub fn notice_title(&self) -> &'static str {
        match self {
            LabError::SessionInactive(_) => "Experiment Not Started",
            LabError::IllegalTransition { .. } => "Action Not Allowed",
            LabError::ContainerNotFound(_) | LabError::NotABottle(_) => "Pour Failed",
            LabError::InvalidTarget(_) => "Invalid Target",
            LabError::InvalidAmount(_) => "Invalid Amount",
            LabError::InsufficientVolume { .. } => "Insufficient Volume",
            LabError::BottleEmpty(_) => "Cannot Select",
            LabError::OutOfBounds { .. }
            | LabError::PositionOccupied(_)
            | LabError::MissingBottleChemical(_)
            | LabError::UnknownEquipment(_) => "Cannot Place",
            LabError::EmptyContainer(_) => "Nothing To Adjust",
            LabError::UnknownSubstance(_) => "Unknown Chemical",
            _ => "Error",
        }
    }

    /// True for precondition rejections, which leave the bench untouched.
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            LabError::ConfigError(_)
                | LabError::FileIO(..)
                | LabError::YamlParsing(..)
                | LabError::JsonParsing(_)
                | LabError::CsvError(..)
                | LabError::Http(_)
                | LabError::LoggingError(_)
        )
    }
}

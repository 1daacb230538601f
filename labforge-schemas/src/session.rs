use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    #[default]
    Idle,
    Active,
    Paused,
    Completed,
}

impl fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Whether the bench currently accepts mutating operations, and since when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentState {
    #[serde(default)]
    pub status: ExperimentStatus,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub current_session: Option<String>,
    #[serde(default = "default_auto_save")]
    pub auto_save_enabled: bool,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

fn default_auto_save() -> bool {
    true
}

impl Default for ExperimentState {
    fn default() -> Self {
        Self {
            status: ExperimentStatus::Idle,
            start_time: None,
            current_session: None,
            auto_save_enabled: true,
            end_time: None,
        }
    }
}

impl ExperimentState {
    pub fn is_active(&self) -> bool {
        self.status == ExperimentStatus::Active
    }
}

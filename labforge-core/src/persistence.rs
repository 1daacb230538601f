//! Local snapshot of the bench and the upload of experiment summaries.
//!
//! Loading is forgiving: a missing key, corrupt JSON or a snapshot written
//! by a newer version all yield the empty bench, and unreadable fields fall
//! back one at a time. Unversioned snapshots are read with the legacy field
//! names (`type`, `chemicalObjects`, `chemical`, `volumeRemaining`).

use crate::{
    error::LabError,
    resolver::outcome::normalize_value,
    simulation::{
        engine::LabEngine,
        state::{BottleState, Container},
    },
};
use chrono::{DateTime, Utc};
use labforge_schemas::{
    chemical::{sanitize_volume, BottleChemical, ChemicalQuantity, DEFAULT_CHEMICAL_COLOR},
    equipment::EquipmentKind,
    experiment::ExperimentSummary,
    reaction::{OutcomeSource, ReactionRecord},
    safety::SafetyAlert,
    session::{ExperimentState, ExperimentStatus},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

pub const STORAGE_KEY: &str = "virtual-lab-state";
pub const SCHEMA_VERSION: u32 = 2;
const LEGACY_BOTTLE_CAPACITY_ML: f64 = 500.0;

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, LabError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), LabError>;
    fn remove(&mut self, key: &str) -> Result<(), LabError>;
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, LabError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LabError::FileIO(path.display().to_string(), e)),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), LabError> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| LabError::FileIO(self.dir.display().to_string(), e))?;
        let path = self.path_for(key);
        fs::write(&path, value).map_err(|e| LabError::FileIO(path.display().to_string(), e))
    }

    fn remove(&mut self, key: &str) -> Result<(), LabError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LabError::FileIO(path.display().to_string(), e)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, LabError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), LabError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), LabError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// The persisted blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabSnapshot {
    pub schema_version: u32,
    pub placed_equipment: Vec<Container>,
    pub reactions: Vec<ReactionRecord>,
    pub experiment_state: ExperimentState,
    pub is_experiment_started: bool,
    pub score: u32,
    pub badges: Vec<String>,
    pub safety_alerts: Vec<SafetyAlert>,
}

impl Default for LabSnapshot {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            placed_equipment: Vec::new(),
            reactions: Vec::new(),
            experiment_state: ExperimentState::default(),
            is_experiment_started: false,
            score: 0,
            badges: Vec::new(),
            safety_alerts: Vec::new(),
        }
    }
}

pub fn save_snapshot(store: &mut dyn KeyValueStore, engine: &LabEngine) -> Result<(), LabError> {
    let json = serde_json::to_string(&engine.snapshot())?;
    store.set(STORAGE_KEY, &json)
}

pub fn clear_snapshot(store: &mut dyn KeyValueStore) -> Result<(), LabError> {
    store.remove(STORAGE_KEY)
}

/// Reads the stored snapshot. Never fails; problems are reported on stderr
/// and the affected part starts empty.
pub fn load_snapshot(store: &dyn KeyValueStore) -> LabSnapshot {
    match store.get(STORAGE_KEY) {
        Ok(Some(raw)) => decode_snapshot(&raw),
        Ok(None) => LabSnapshot::default(),
        Err(e) => {
            eprintln!("[Persistence] Could not read saved lab state: {e}. Starting fresh.");
            LabSnapshot::default()
        }
    }
}

pub fn decode_snapshot(raw: &str) -> LabSnapshot {
    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            eprintln!("[Persistence] Saved lab state is corrupt ({e}). Starting fresh.");
            return LabSnapshot::default();
        }
    };
    let Some(obj) = value.as_object() else {
        eprintln!("[Persistence] Saved lab state is not an object. Starting fresh.");
        return LabSnapshot::default();
    };

    let version = obj.get("schemaVersion").and_then(Value::as_u64).unwrap_or(1);
    if version > u64::from(SCHEMA_VERSION) {
        eprintln!(
            "[Persistence] Saved lab state has schema version {version}, newer than {SCHEMA_VERSION}. Starting fresh."
        );
        return LabSnapshot::default();
    }
    if version < u64::from(SCHEMA_VERSION) {
        println!("[Persistence] Migrating saved lab state from schema version {version}.");
    }

    let mut experiment_state = obj
        .get("experimentState")
        .map(experiment_state_from_value)
        .unwrap_or_default();
    let is_experiment_started = obj
        .get("isExperimentStarted")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if is_experiment_started && experiment_state.status == ExperimentStatus::Idle {
        experiment_state.status = ExperimentStatus::Active;
    }

    LabSnapshot {
        schema_version: SCHEMA_VERSION,
        placed_equipment: items(obj, "placedEquipment")
            .filter_map(container_from_value)
            .collect(),
        reactions: items(obj, "reactions")
            .filter_map(reaction_from_value)
            .collect(),
        is_experiment_started: experiment_state.is_active(),
        experiment_state,
        score: obj
            .get("score")
            .and_then(Value::as_f64)
            .filter(|s| s.is_finite() && *s >= 0.0)
            .map(|s| s.min(f64::from(u32::MAX)) as u32)
            .unwrap_or(0),
        badges: items(obj, "badges")
            .filter_map(|b| b.as_str().map(str::to_string))
            .collect(),
        safety_alerts: items(obj, "safetyAlerts").filter_map(parse::<SafetyAlert>).collect(),
    }
}

fn items<'a>(obj: &'a Map<String, Value>, key: &str) -> impl Iterator<Item = &'a Value> + 'a {
    obj.get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn parse<T: DeserializeOwned>(value: &Value) -> Option<T> {
    serde_json::from_value(value.clone()).ok()
}

fn number(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    obj.get(key).and_then(Value::as_f64).filter(|v| v.is_finite())
}

fn date(value: Option<&Value>) -> Option<DateTime<Utc>> {
    value.and_then(parse::<DateTime<Utc>>)
}

fn experiment_state_from_value(value: &Value) -> ExperimentState {
    let Some(obj) = value.as_object() else {
        return ExperimentState::default();
    };
    ExperimentState {
        status: obj.get("status").and_then(parse).unwrap_or_default(),
        start_time: date(obj.get("startTime")),
        current_session: obj
            .get("currentSession")
            .and_then(Value::as_str)
            .map(str::to_string),
        auto_save_enabled: obj
            .get("autoSaveEnabled")
            .and_then(Value::as_bool)
            .unwrap_or(true),
        end_time: date(obj.get("endTime")),
    }
}

fn container_from_value(value: &Value) -> Option<Container> {
    if let Some(container) = parse::<Container>(value) {
        return Some(container);
    }
    legacy_container(value.as_object()?)
}

fn legacy_container(obj: &Map<String, Value>) -> Option<Container> {
    let id = obj.get("id").and_then(Value::as_str)?.to_string();
    let bottle_chemical = obj.get("chemical").and_then(legacy_bottle_chemical);
    let kind = obj
        .get("kind")
        .or_else(|| obj.get("type"))
        .and_then(Value::as_str)
        .and_then(EquipmentKind::from_catalog_id)
        .unwrap_or(if bottle_chemical.is_some() {
            EquipmentKind::ChemicalBottle
        } else {
            EquipmentKind::Beaker
        });
    let position = match obj.get("position") {
        Some(Value::Array(coords)) if coords.len() == 3 => {
            let mut out = [0.0; 3];
            for (slot, c) in out.iter_mut().zip(coords) {
                *slot = c.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0);
            }
            out
        }
        Some(Value::Object(p)) => [
            number(p, "x").unwrap_or(0.0),
            number(p, "y").unwrap_or(0.0),
            number(p, "z").unwrap_or(0.0),
        ],
        _ => [0.0; 3],
    };

    let mut container = Container::new(id, kind, position);
    container.contents = items(obj, "contents")
        .chain(items(obj, "chemicalObjects"))
        .filter_map(legacy_quantity)
        .collect();
    container.recompute_total();
    container.temperature = number(obj, "temperature").unwrap_or(0.0);
    container.ph = number(obj, "pH").unwrap_or(7.0);
    container.is_heated = obj.get("isHeated").and_then(Value::as_bool).unwrap_or(false);
    container.reaction_type = obj
        .get("reactionType")
        .and_then(Value::as_str)
        .map(str::to_string);
    container.reaction_progress = number(obj, "reactionProgress").unwrap_or(0.0).clamp(0.0, 1.0);

    if kind.is_bottle() {
        let chemical = bottle_chemical.or_else(|| {
            container.contents.first().map(|q| BottleChemical {
                name: q.name.clone(),
                formula: String::new(),
                color: q.color.clone(),
                concentration: 1.0,
            })
        })?;
        let max_volume = number(obj, "maxVolume")
            .filter(|v| *v > 0.0)
            .unwrap_or(LEGACY_BOTTLE_CAPACITY_ML);
        let mut bottle = BottleState::full(chemical, max_volume);
        bottle.volume_remaining = number(obj, "volumeRemaining")
            .map(sanitize_volume)
            .unwrap_or(max_volume)
            .min(max_volume);
        container.bottle = Some(bottle);
        container.sync_bottle();
    }
    Some(container)
}

fn legacy_bottle_chemical(value: &Value) -> Option<BottleChemical> {
    match value {
        Value::String(name) => Some(BottleChemical {
            name: name.clone(),
            formula: String::new(),
            color: DEFAULT_CHEMICAL_COLOR.to_string(),
            concentration: 1.0,
        }),
        Value::Object(_) => parse(value),
        _ => None,
    }
}

fn legacy_quantity(value: &Value) -> Option<ChemicalQuantity> {
    let obj = value.as_object()?;
    let name = obj.get("name").and_then(Value::as_str)?;
    let color = obj
        .get("color")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_CHEMICAL_COLOR);
    Some(ChemicalQuantity::new(name, number(obj, "volume").unwrap_or(0.0), color))
}

fn reaction_from_value(value: &Value) -> Option<ReactionRecord> {
    if let Some(record) = parse::<ReactionRecord>(value) {
        return Some(record);
    }
    // Unversioned history stored the raw service answer.
    let obj = value.as_object()?;
    let outcome = normalize_value(value, 0.0, 0.0, OutcomeSource::Remote).ok()?;
    Some(ReactionRecord {
        equipment_id: obj
            .get("equipmentId")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        outcome,
        tick: 0,
        started_at: date(obj.get("timestamp")).unwrap_or_else(Utc::now),
    })
}

/// The per-user experiments log.
pub trait ExperimentStore {
    fn save_experiment(&self, summary: &ExperimentSummary) -> Result<(), LabError>;
}

/// POSTs summaries to `{base}/api/add-experiment`.
#[derive(Debug, Clone)]
pub struct HttpExperimentStore {
    base_url: String,
    client: reqwest::blocking::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddExperimentRequest<'a> {
    experiment_data: &'a ExperimentSummary,
}

impl HttpExperimentStore {
    pub fn new(base_url: &str, timeout_ms: u64) -> Result<Self, LabError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(timeout_ms.max(1)))
            .build()
            .map_err(|e| LabError::Http(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

impl ExperimentStore for HttpExperimentStore {
    fn save_experiment(&self, summary: &ExperimentSummary) -> Result<(), LabError> {
        let url = format!("{}/api/add-experiment", self.base_url);
        let response = self
            .client
            .post(url)
            .json(&AddExperimentRequest {
                experiment_data: summary,
            })
            .send()
            .map_err(|e| LabError::Http(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LabError::Http(format!("status {}: {}", status.as_u16(), body)));
        }
        Ok(())
    }
}

/// Path of the snapshot file a `FileStore` rooted at `dir` would use.
pub fn snapshot_path(dir: &Path) -> PathBuf {
    FileStore::new(dir).path_for(STORAGE_KEY)
}

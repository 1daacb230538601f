use anyhow::{Context, Result};
use labforge_core::{
    config::LabConfig,
    resolver::{local::ReactionTable, remote::InferenceConfig},
};
use labforge_schemas::{
    chemical::Substance,
    file_formats::{ReactionRuleFile, SafetyRuleFile, SubstanceFile},
    reaction::ReactionRule,
    safety::SafetyRules,
};
use std::{collections::HashMap, fs, path::Path};

/// Base URL of the experiments backend that receives session summaries.
pub const ENV_EXPERIMENT_STORE_URL: &str = "LABFORGE_EXPERIMENT_STORE_URL";
pub const ENV_USER_ID: &str = "LABFORGE_USER_ID";

/// The reference data a bench is built from: chemicals, the reaction
/// fallback table and the safety rules.
pub struct KnowledgeBase {
    pub substances: HashMap<String, Substance>,
    pub reactions: HashMap<String, ReactionRule>,
    pub safety: SafetyRules,
}

impl KnowledgeBase {
    /// Loads every YAML file under `substances/`, `reactions/` and `safety/`.
    /// A missing sub-directory contributes nothing.
    pub fn load(base_path: &str) -> Result<Self> {
        println!("Loading knowledge base from '{}'...", base_path);

        let substances = load_yaml_files_into_map(
            Path::new(base_path).join("substances"),
            |file: SubstanceFile| file.substances,
            |item: &Substance| item.name.to_lowercase(),
        )?;
        let reactions = load_yaml_files_into_map(
            Path::new(base_path).join("reactions"),
            |file: ReactionRuleFile| file.reactions,
            |item: &ReactionRule| item.id.clone(),
        )?;
        let mut safety = SafetyRules::default();
        for file in load_yaml_files::<_, SafetyRuleFile>(Path::new(base_path).join("safety"))? {
            safety.merge(file.safety);
        }

        println!(
            "Knowledge base loaded: {} substances, {} reactions, {} safety combinations.",
            substances.len(),
            reactions.len(),
            safety.incompatible_combinations.len()
        );
        Ok(Self {
            substances,
            reactions,
            safety,
        })
    }

    /// Substances sorted by name, so catalog order does not depend on the
    /// hash map.
    pub fn substance_list(&self) -> Vec<Substance> {
        let mut list: Vec<Substance> = self.substances.values().cloned().collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    /// The built-in rules overlaid with the knowledge base's; an entry with
    /// the same id replaces the built-in one.
    pub fn reaction_table(&self) -> ReactionTable {
        let mut table = ReactionTable::builtin();
        let mut ids: Vec<&String> = self.reactions.keys().collect();
        ids.sort();
        for id in ids {
            table.insert(self.reactions[id].clone());
        }
        table
    }
}

pub fn load_lab_config(path: Option<&Path>) -> Result<LabConfig> {
    match path {
        Some(path) => LabConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load lab config {:?}", path)),
        None => Ok(LabConfig::default()),
    }
}

/// Inference settings from a YAML file when given, otherwise from the
/// environment. `None` means the resolver runs on the local table only.
pub fn load_inference_config(path: Option<&Path>) -> Result<Option<InferenceConfig>> {
    if let Some(path) = path {
        let config = InferenceConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load inference config {:?}", path))?;
        return Ok(Some(config));
    }
    InferenceConfig::from_env().context("Invalid inference settings in the environment")
}

pub fn experiment_store_url(flag: Option<String>) -> Option<String> {
    flag.or_else(|| std::env::var(ENV_EXPERIMENT_STORE_URL).ok())
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
}

pub fn user_id(flag: Option<String>) -> Option<String> {
    flag.or_else(|| std::env::var(ENV_USER_ID).ok())
        .filter(|id| !id.trim().is_empty())
}

/// Generic helper to load all YAML files in a directory into a HashMap.
fn load_yaml_files_into_map<P, F, E, T, K>(
    dir_path: P,
    extract_vec: E,
    get_key: K,
) -> Result<HashMap<String, T>>
where
    P: AsRef<Path>,
    F: for<'de> serde::Deserialize<'de>, // The file wrapper struct (e.g., SubstanceFile)
    E: Fn(F) -> Vec<T>,                  // A closure to extract the Vec<T> from the wrapper
    K: Fn(&T) -> String,                 // A closure to get the key for the map from an item T
{
    let mut map = HashMap::new();
    for file_wrapper in load_yaml_files::<_, F>(dir_path)? {
        for item in extract_vec(file_wrapper) {
            map.insert(get_key(&item), item);
        }
    }
    Ok(map)
}

fn load_yaml_files<P, F>(dir_path: P) -> Result<Vec<F>>
where
    P: AsRef<Path>,
    F: for<'de> serde::Deserialize<'de>,
{
    let dir_path = dir_path.as_ref();
    if !dir_path.is_dir() {
        return Ok(Vec::new());
    }
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir_path)
        .with_context(|| format!("Failed to read directory: {:?}", dir_path))?
    {
        let path = entry?.path();
        if path.is_file() && path.extension().map_or(false, |s| s == "yaml" || s == "yml") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut files = Vec::new();
    for path in paths {
        let content = fs::read_to_string(&path)?;
        let file_wrapper: F = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML from {:?}", path))?;
        files.push(file_wrapper);
    }
    Ok(files)
}

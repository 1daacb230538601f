//! Clients for the remote reaction inference service.

use super::outcome::OutcomeError;
use crate::error::LabError;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};
use thiserror::Error;

pub const ENV_INFERENCE_MODE: &str = "LABFORGE_INFERENCE_MODE";
pub const ENV_INFERENCE_BASE_URL: &str = "LABFORGE_INFERENCE_BASE_URL";
pub const ENV_INFERENCE_API_KEY: &str = "LABFORGE_INFERENCE_API_KEY";
pub const ENV_INFERENCE_MODEL: &str = "LABFORGE_INFERENCE_MODEL";
pub const ENV_INFERENCE_TIMEOUT_MS: &str = "LABFORGE_INFERENCE_TIMEOUT_MS";

pub const DEFAULT_INFERENCE_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_CHAT_MODEL: &str = "deepseek-chat";
const CHAT_TEMPERATURE: f64 = 0.1;

/// Which wire contract the configured endpoint speaks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InferenceMode {
    /// The lab backend's `/api/reaction` proxy.
    #[default]
    Proxy,
    /// An OpenAI-compatible `/chat/completions` endpoint.
    Chat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceConfig {
    #[serde(default)]
    pub mode: InferenceMode,
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_model() -> String {
    DEFAULT_CHAT_MODEL.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_INFERENCE_TIMEOUT_MS
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InferenceConfigError {
    #[error("invalid inference mode: {value}")]
    InvalidMode { value: String },
    #[error("invalid timeout value: {value}")]
    InvalidTimeout { value: String },
    #[error("chat mode requires LABFORGE_INFERENCE_API_KEY")]
    MissingApiKey,
}

impl InferenceConfig {
    /// Reads the config from the process environment.
    /// `Ok(None)` means no base URL is set and the bench runs offline.
    pub fn from_env() -> Result<Option<Self>, InferenceConfigError> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    pub fn from_env_with<F>(mut getter: F) -> Result<Option<Self>, InferenceConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let Some(base_url) = getter(ENV_INFERENCE_BASE_URL).filter(|v| !v.trim().is_empty()) else {
            return Ok(None);
        };
        let mode = match getter(ENV_INFERENCE_MODE) {
            Some(value) => match value.trim().to_ascii_lowercase().as_str() {
                "" | "proxy" => InferenceMode::Proxy,
                "chat" => InferenceMode::Chat,
                _ => return Err(InferenceConfigError::InvalidMode { value }),
            },
            None => InferenceMode::Proxy,
        };
        let timeout_ms = match getter(ENV_INFERENCE_TIMEOUT_MS) {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map_err(|_| InferenceConfigError::InvalidTimeout { value })?,
            None => DEFAULT_INFERENCE_TIMEOUT_MS,
        };
        let api_key = getter(ENV_INFERENCE_API_KEY).filter(|v| !v.trim().is_empty());
        let model = getter(ENV_INFERENCE_MODEL)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(default_model);

        let config = Self {
            mode,
            base_url: base_url.trim().to_string(),
            api_key,
            model,
            timeout_ms,
        };
        config.validate()?;
        Ok(Some(config))
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, LabError> {
        let path_str = path.to_string_lossy().to_string();
        let content = fs::read_to_string(path).map_err(|e| LabError::FileIO(path_str.clone(), e))?;
        let config: Self =
            serde_yaml::from_str(&content).map_err(|e| LabError::YamlParsing(path_str, e))?;
        config
            .validate()
            .map_err(|e| LabError::ConfigError(e.to_string()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), InferenceConfigError> {
        if self.mode == InferenceMode::Chat && self.api_key.is_none() {
            return Err(InferenceConfigError::MissingApiKey);
        }
        Ok(())
    }
}

/// The body sent to the inference service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceRequest {
    pub chemical_a: String,
    pub chemical_b: String,
    pub volume_a: f64,
    pub volume_b: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InferenceError {
    #[error("remote inference is not configured")]
    Disabled,
    #[error("client build failed: {message}")]
    BuildClient { message: String },
    #[error("request timed out: {message}")]
    Timeout { message: String },
    #[error("http request failed: {message}")]
    Http { message: String },
    #[error("http status {code}: {message}")]
    HttpStatus { code: u16, message: String },
    #[error("decode response failed: {message}")]
    DecodeResponse { message: String },
    #[error("empty completion choice")]
    EmptyChoice,
    #[error("malformed reaction: {0}")]
    Malformed(#[from] OutcomeError),
}

/// Returns the raw response text for a reaction query.
pub trait InferenceClient {
    fn infer(&self, request: &InferenceRequest) -> Result<String, InferenceError>;
}

impl InferenceClient for Box<dyn InferenceClient> {
    fn infer(&self, request: &InferenceRequest) -> Result<String, InferenceError> {
        (**self).infer(request)
    }
}

/// Client used when no endpoint is configured; every call fails fast.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineClient;

impl InferenceClient for OfflineClient {
    fn infer(&self, _request: &InferenceRequest) -> Result<String, InferenceError> {
        Err(InferenceError::Disabled)
    }
}

/// Builds the client matching `config`, or the offline client without one.
pub fn client_from_config(config: Option<&InferenceConfig>) -> Result<Box<dyn InferenceClient>, InferenceError> {
    match config {
        None => Ok(Box::new(OfflineClient)),
        Some(config) => match config.mode {
            InferenceMode::Proxy => Ok(Box::new(ProxyInferenceClient::from_config(config)?)),
            InferenceMode::Chat => Ok(Box::new(ChatInferenceClient::from_config(config)?)),
        },
    }
}

fn build_http_client(timeout_ms: u64) -> Result<Client, InferenceError> {
    Client::builder()
        .timeout(Duration::from_millis(timeout_ms.max(1)))
        .build()
        .map_err(|err| InferenceError::BuildClient {
            message: err.to_string(),
        })
}

fn transport_error(err: reqwest::Error) -> InferenceError {
    if err.is_timeout() {
        InferenceError::Timeout {
            message: err.to_string(),
        }
    } else {
        InferenceError::Http {
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProxyInferenceClient {
    base_url: String,
    client: Client,
}

impl ProxyInferenceClient {
    pub fn from_config(config: &InferenceConfig) -> Result<Self, InferenceError> {
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client: build_http_client(config.timeout_ms)?,
        })
    }
}

impl InferenceClient for ProxyInferenceClient {
    fn infer(&self, request: &InferenceRequest) -> Result<String, InferenceError> {
        let url = format!("{}/api/reaction", self.base_url);
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .map_err(transport_error)?;

        let status = response.status();
        if status != StatusCode::OK {
            let message = response.text().unwrap_or_else(|_| "<no body>".to_string());
            return Err(InferenceError::HttpStatus {
                code: status.as_u16(),
                message,
            });
        }
        response.text().map_err(|err| InferenceError::DecodeResponse {
            message: err.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ChatInferenceClient {
    base_url: String,
    api_key: String,
    model: String,
    client: Client,
}

impl ChatInferenceClient {
    pub fn from_config(config: &InferenceConfig) -> Result<Self, InferenceError> {
        let api_key = config.api_key.clone().ok_or_else(|| InferenceError::BuildClient {
            message: InferenceConfigError::MissingApiKey.to_string(),
        })?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            client: build_http_client(config.timeout_ms)?,
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

impl InferenceClient for ChatInferenceClient {
    fn infer(&self, request: &InferenceRequest) -> Result<String, InferenceError> {
        let url = format!("{}/chat/completions", self.base_url);
        let prompt = reaction_prompt(request);
        let payload = ChatCompletionRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: &prompt,
            }],
            temperature: CHAT_TEMPERATURE,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .map_err(transport_error)?;

        let status = response.status();
        if status != StatusCode::OK {
            let message = response.text().unwrap_or_else(|_| "<no body>".to_string());
            return Err(InferenceError::HttpStatus {
                code: status.as_u16(),
                message,
            });
        }

        let response: ChatCompletionResponse =
            response.json().map_err(|err| InferenceError::DecodeResponse {
                message: err.to_string(),
            })?;
        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(InferenceError::EmptyChoice)
    }
}

/// The instruction sent to a chat model for one reactant pair.
pub fn reaction_prompt(request: &InferenceRequest) -> String {
    format!(
        "You are a chemistry reaction engine for a virtual lab bench.\n\
         Predict what happens when {volume_a} mL of {a} is mixed with {volume_b} mL of {b} \
         at room conditions.\n\
         Answer with a single JSON object and nothing else, using exactly these keys:\n\
         reactionName (string), equation (string), description (string), type (string), \
         reacts (boolean), products (array of {{name, state, color}}), outputChemical (string), \
         outputVolume (number, mL), finalColor (hex string), finalTemperature (number, °C), \
         gas (string or empty), precipitate (string or empty), danger (string or empty), \
         safetyLevel (string), energy (number).\n\
         If the substances do not react, set reacts to false.",
        a = request.chemical_a,
        b = request.chemical_b,
        volume_a = request.volume_a,
        volume_b = request.volume_b,
    )
}

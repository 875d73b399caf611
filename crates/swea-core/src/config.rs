use crate::error::{Result, SweaError};
use crate::paths;
use crate::search::SearchEngine;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Replaces secret values in `Config::redacted`. Patches carrying this value
/// leave the stored secret untouched.
pub const MASK: &str = "********";

pub const OPENROUTER_KEY_ENV: &str = "OPENROUTER_API_KEY";

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    1337
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "https://localhost:3000".to_string(),
    ]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
        }
    }
}

// ---------------------------------------------------------------------------
// ApiKeys / ApiEndpoints
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiKeys {
    #[serde(default)]
    pub openrouter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEndpoints {
    #[serde(default = "default_openrouter_endpoint")]
    pub openrouter: String,
}

fn default_openrouter_endpoint() -> String {
    "https://openrouter.ai/api/v1/chat/completions".to_string()
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            openrouter: default_openrouter_endpoint(),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults / Timeouts / InferenceConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_search_engine")]
    pub search_engine: SearchEngine,
}

fn default_model() -> String {
    "openai/gpt-4o-mini".to_string()
}

fn default_search_engine() -> SearchEngine {
    SearchEngine::Google
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            model: default_model(),
            search_engine: default_search_engine(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeouts {
    /// Upper bound for one provider call.
    #[serde(default = "default_inference_secs")]
    pub inference_secs: u64,
    /// How long `POST /api/messages` waits for the run before answering.
    #[serde(default = "default_message_wait_secs")]
    pub message_wait_secs: u64,
}

fn default_inference_secs() -> u64 {
    30
}

fn default_message_wait_secs() -> u64 {
    120
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            inference_secs: default_inference_secs(),
            message_wait_secs: default_message_wait_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_max_tokens() -> u32 {
    512
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub api_keys: ApiKeys,
    #[serde(default)]
    pub api_endpoints: ApiEndpoints,
    #[serde(default = "default_models")]
    pub models: Vec<String>,
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default)]
    pub inference: InferenceConfig,
}

fn default_version() -> u32 {
    1
}

fn default_models() -> Vec<String> {
    [
        "openai/gpt-4o-mini",
        "openai/gpt-4o",
        "anthropic/claude-3.5-sonnet",
        "google/gemini-flash-1.5",
        "meta-llama/llama-3.1-8b-instruct",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            server: ServerConfig::default(),
            api_keys: ApiKeys::default(),
            api_endpoints: ApiEndpoints::default(),
            models: default_models(),
            defaults: Defaults::default(),
            timeouts: Timeouts::default(),
            inference: InferenceConfig::default(),
        }
    }
}

impl Config {
    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Load `.swea/config.yaml`; a missing file yields the defaults.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let config: Config = serde_yaml::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Configured OpenRouter key, falling back to `OPENROUTER_API_KEY`.
    pub fn openrouter_api_key(&self) -> Option<String> {
        self.api_keys
            .openrouter
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                std::env::var(OPENROUTER_KEY_ENV)
                    .ok()
                    .filter(|k| !k.trim().is_empty())
            })
    }

    /// JSON view with secrets masked, for the settings endpoint.
    pub fn redacted(&self) -> Result<serde_json::Value> {
        let mut value = serde_json::to_value(self)?;
        if let Some(keys) = value
            .get_mut("api_keys")
            .and_then(serde_json::Value::as_object_mut)
        {
            for v in keys.values_mut() {
                if v.as_str().is_some_and(|s| !s.is_empty()) {
                    *v = serde_json::Value::String(MASK.to_string());
                }
            }
        }
        Ok(value)
    }

    // -----------------------------------------------------------------------
    // Updates
    // -----------------------------------------------------------------------

    /// Deep-merge a JSON patch into this config. The merged result must still
    /// deserialize and validate, otherwise `self` is left unchanged.
    pub fn apply_update(&mut self, patch: &serde_json::Value) -> Result<()> {
        if !patch.is_object() {
            return Err(SweaError::Validation(
                "settings update must be a JSON object".to_string(),
            ));
        }
        let mut merged = serde_json::to_value(&*self)?;
        merge(&mut merged, patch);
        let updated: Config = serde_json::from_value(merged)
            .map_err(|e| SweaError::Validation(format!("invalid settings: {e}")))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.models.is_empty() {
            return Err(SweaError::Validation(
                "models: at least one model must be configured".to_string(),
            ));
        }
        if self.defaults.model.trim().is_empty() {
            return Err(SweaError::Validation(
                "defaults.model must not be empty".to_string(),
            ));
        }
        if self.timeouts.inference_secs == 0 || self.timeouts.message_wait_secs == 0 {
            return Err(SweaError::Validation(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Recursive JSON merge: objects merge key by key, everything else replaces.
/// Masked secrets are skipped.
fn merge(base: &mut serde_json::Value, patch: &serde_json::Value) {
    match (base, patch) {
        (serde_json::Value::Object(base), serde_json::Value::Object(patch)) => {
            for (k, v) in patch {
                if v.as_str() == Some(MASK) {
                    continue;
                }
                match base.get_mut(k) {
                    Some(existing) => merge(existing, v),
                    None => {
                        base.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (base, patch) => *base = patch.clone(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

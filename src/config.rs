//! Configuration management.
//!
//! docflow configuration can come from:
//! - Environment variables (DOCFLOW_*)
//! - Config file (~/.config/docflow/config.toml)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// docflow configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Generation backend configuration
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Output configuration
    #[serde(default)]
    pub outputs: OutputsConfig,
}

/// Generation backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Generation service endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model name passed through to the backend
    #[serde(default)]
    pub model: Option<String>,

    /// System prompt prepended to every step
    #[serde(default)]
    pub system: Option<String>,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: Option<f64>,

    /// Default per-step timeout (seconds)
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: None,
            system: None,
            temperature: None,
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_endpoint() -> String {
    "http://localhost:3000/api/chat".to_string()
}

fn default_timeout() -> u64 {
    crate::generation::DEFAULT_TIMEOUT_SECS
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputsConfig {
    /// Directory artifacts are written into
    #[serde(default = "default_outputs_dir")]
    pub directory: PathBuf,
}

impl Default for OutputsConfig {
    fn default() -> Self {
        Self {
            directory: default_outputs_dir(),
        }
    }
}

fn default_outputs_dir() -> PathBuf {
    PathBuf::from("outputs")
}

impl Config {
    /// Load configuration from default locations.
    pub fn load() -> Self {
        Self::load_from(None)
    }

    /// Load configuration, reading `path` instead of the default config
    /// file location when one is given. Environment overrides apply
    /// either way.
    pub fn load_from(path: Option<&Path>) -> Self {
        let mut config = Self::default();

        let default_path;
        let path = match path {
            Some(p) => p,
            None => {
                default_path = Self::config_dir().join("config.toml");
                &default_path
            }
        };
        if let Ok(partial) = Self::load_partial_from_path(path) {
            config.apply_partial(partial);
        }

        config.apply_env_overrides();
        config
    }

    /// Get the config directory.
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("docflow"))
            .unwrap_or_else(|| PathBuf::from(".docflow"))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(endpoint) = std::env::var("DOCFLOW_GENERATION_ENDPOINT") {
            self.generation.endpoint = endpoint;
        }
        if let Ok(model) = std::env::var("DOCFLOW_GENERATION_MODEL") {
            self.generation.model = Some(model);
        }
        if let Ok(timeout) = std::env::var("DOCFLOW_GENERATION_TIMEOUT_SECONDS") {
            if let Ok(parsed) = timeout.parse::<u64>() {
                self.generation.timeout_seconds = parsed;
            }
        }
        if let Ok(dir) = std::env::var("DOCFLOW_OUTPUTS_DIR") {
            self.outputs.directory = PathBuf::from(dir);
        }
    }

    fn load_partial_from_path(path: &Path) -> std::result::Result<PartialConfig, ()> {
        let content = std::fs::read_to_string(path).map_err(|_| ())?;
        toml::from_str(&content).map_err(|_| ())
    }

    fn apply_partial(&mut self, partial: PartialConfig) {
        if let Some(generation) = partial.generation {
            self.generation = generation;
        }
        if let Some(outputs) = partial.outputs {
            self.outputs = outputs;
        }
    }
}

/// Partial configuration, where every section is optional.
#[derive(Debug, Deserialize)]
struct PartialConfig {
    generation: Option<GenerationConfig>,
    outputs: Option<OutputsConfig>,
}

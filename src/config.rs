//! TOML configuration.
//!
//! ```toml
//! [retrieval]
//! storage_root = "files"
//! flush_every = 500
//! write_mode = "overwrite"   # or "atomic"
//!
//! [remote]
//! max_attempts = 3
//! timeout_secs = 30
//!
//! [models.GPT-4o]
//! repo_id = "gpt-4o"
//! context_length = 128000
//! max_tokens = 512
//! tokenizer = "tokenizers/gpt-4o.json"
//! ```
//!
//! API keys are read from the environment only.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::budget::{model_family, TokenCountError};
use crate::remote::RetryPolicy;
use crate::retrieval::{FlushPolicy, WriteMode};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Unknown model: {0}")]
    UnknownModel(String),
    #[error("Invalid settings for model {model}: {reason}")]
    InvalidModel { model: String, reason: String },
    #[error("Environment variable {0} is not set")]
    MissingEnv(&'static str),
    #[error("HTTP client setup failed: {0}")]
    Http(String),
    #[error(transparent)]
    Tokenizer(#[from] TokenCountError),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub retrieval: RetrievalSettings,

    #[serde(default)]
    pub remote: RemoteSettings,

    /// Per-model settings keyed by model name (`GPT-4o`, `CLAUDE-3.5-SONNET`, ...).
    #[serde(default)]
    pub models: BTreeMap<String, ModelConfig>,
}

impl Settings {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let mut settings: Settings = toml::from_str(s)?;
        for (name, model) in settings.models.iter_mut() {
            model.name = name.clone();
            model.validate()?;
        }
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Like [`load`](Self::load), but a missing file yields defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
                info!("No config file found at {}, using defaults", path.display());
                Ok(Self::default())
            }
            other => other,
        }
    }

    pub fn model(&self, name: &str) -> Result<&ModelConfig, ConfigError> {
        self.models
            .get(name)
            .ok_or_else(|| ConfigError::UnknownModel(name.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSettings {
    #[serde(default = "default_storage_root")]
    pub storage_root: PathBuf,

    #[serde(default = "default_flush_every")]
    pub flush_every: usize,

    #[serde(default)]
    pub write_mode: WriteMode,
}

impl RetrievalSettings {
    pub fn flush_policy(&self) -> FlushPolicy {
        FlushPolicy {
            flush_every: self.flush_every,
            write_mode: self.write_mode,
        }
    }
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            storage_root: default_storage_root(),
            flush_every: default_flush_every(),
            write_mode: WriteMode::default(),
        }
    }
}

/// Bounded waits and retries for remote counting and embedding calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// Total attempts per call; 1 disables retries.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl RemoteSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Filled from the table key.
    #[serde(skip)]
    pub name: String,

    /// Provider-side model id; defaults to the model name.
    #[serde(default)]
    pub repo_id: Option<String>,

    pub context_length: usize,

    /// Tokens held back for the model's answer. Accepts the provider
    /// spellings `max_new_tokens`, `max_tokens` and `max_output_tokens`.
    #[serde(
        default = "default_reserved_generation_tokens",
        alias = "max_new_tokens",
        alias = "max_tokens",
        alias = "max_output_tokens"
    )]
    pub reserved_generation_tokens: usize,

    /// Path to a `tokenizer.json` for local counting.
    #[serde(default)]
    pub tokenizer: Option<PathBuf>,

    /// Overrides the family derived from the model name.
    #[serde(default)]
    pub family: Option<String>,
}

impl ModelConfig {
    pub fn new(name: impl Into<String>, context_length: usize) -> Self {
        Self {
            name: name.into(),
            repo_id: None,
            context_length,
            reserved_generation_tokens: default_reserved_generation_tokens(),
            tokenizer: None,
            family: None,
        }
    }

    pub fn family(&self) -> String {
        match &self.family {
            Some(family) => family.to_uppercase(),
            None => model_family(&self.name),
        }
    }

    pub fn repo_id(&self) -> &str {
        self.repo_id.as_deref().unwrap_or(&self.name)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.context_length == 0 {
            return Err(ConfigError::InvalidModel {
                model: self.name.clone(),
                reason: "context_length must be positive".into(),
            });
        }
        if self.reserved_generation_tokens >= self.context_length {
            return Err(ConfigError::InvalidModel {
                model: self.name.clone(),
                reason: format!(
                    "{} reserved generation tokens leave no room in a {}-token window",
                    self.reserved_generation_tokens, self.context_length
                ),
            });
        }
        Ok(())
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("files")
}

fn default_flush_every() -> usize {
    FlushPolicy::DEFAULT_FLUSH_EVERY
}

fn default_max_attempts() -> u32 {
    1
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    8_000
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_reserved_generation_tokens() -> usize {
    512
}

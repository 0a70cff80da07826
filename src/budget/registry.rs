use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::budget::{ApproxTokenCounter, SharedCounter};
use crate::config::{ConfigError, ModelConfig, Settings};

/// Builds the counter for one configured model of a family.
pub type CounterFactory = Box<dyn Fn(&ModelConfig) -> Result<SharedCounter, ConfigError> + Send + Sync>;

/// Family tag of a model name: the part before the first `-`, upper-cased.
///
/// `GPT-4o` → `GPT`, `CLAUDE-3.5-SONNET` → `CLAUDE`, `llama` → `LLAMA`.
pub fn model_family(model_name: &str) -> String {
    model_name
        .split('-')
        .next()
        .unwrap_or(model_name)
        .to_uppercase()
}

/// Token counter selection keyed by model family.
///
/// Families without a registered factory get the local counter: the
/// model's `tokenizer.json` when one is configured (and the `tokenizers`
/// feature is on), the approximate counter otherwise.
pub struct CounterRegistry {
    factories: HashMap<String, CounterFactory>,
}

impl CounterRegistry {
    /// A registry with no family-specific counters.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with the vendor counters enabled by the crate features.
    pub fn from_settings(settings: &Settings) -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::empty();

        #[cfg(feature = "http")]
        {
            use crate::remote::{AnthropicTokenCounter, GeminiTokenCounter};

            let retry = settings.remote.retry_policy();
            let anthropic_retry = retry.clone();
            registry.register("CLAUDE", move |model: &ModelConfig| {
                let counter = AnthropicTokenCounter::from_env(model.repo_id(), anthropic_retry.clone())?;
                Ok(Arc::new(counter) as SharedCounter)
            });
            registry.register("GEMINI", move |model: &ModelConfig| {
                let counter = GeminiTokenCounter::from_env(model.repo_id(), retry.clone())?;
                Ok(Arc::new(counter) as SharedCounter)
            });
        }
        #[cfg(not(feature = "http"))]
        let _ = settings;

        registry
    }

    /// Register `factory` for `family`, replacing any previous one.
    pub fn register<F>(&mut self, family: impl AsRef<str>, factory: F)
    where
        F: Fn(&ModelConfig) -> Result<SharedCounter, ConfigError> + Send + Sync + 'static,
    {
        self.factories
            .insert(family.as_ref().to_uppercase(), Box::new(factory));
    }

    pub fn is_registered(&self, family: &str) -> bool {
        self.factories.contains_key(&family.to_uppercase())
    }

    /// Counter for `model`, picked by its family.
    pub fn resolve(&self, model: &ModelConfig) -> Result<SharedCounter, ConfigError> {
        let family = model.family();
        match self.factories.get(&family) {
            Some(factory) => {
                debug!(model = %model.name, family = %family, "Using family token counter");
                factory(model)
            }
            None => local_counter(model),
        }
    }
}

impl Default for CounterRegistry {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

fn local_counter(model: &ModelConfig) -> Result<SharedCounter, ConfigError> {
    match &model.tokenizer {
        #[cfg(feature = "tokenizers")]
        Some(path) => {
            let counter = crate::budget::HfTokenCounter::from_file(path)?;
            Ok(Arc::new(counter) as SharedCounter)
        }
        #[cfg(not(feature = "tokenizers"))]
        Some(path) => {
            tracing::warn!(
                model = %model.name,
                tokenizer = %path.display(),
                "Built without the tokenizers feature; falling back to approximate counting"
            );
            Ok(Arc::new(ApproxTokenCounter) as SharedCounter)
        }
        None => Ok(Arc::new(ApproxTokenCounter) as SharedCounter),
    }
}

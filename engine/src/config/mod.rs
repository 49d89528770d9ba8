//! Configuration management
//!
//! This module handles loading, validation, and management of the pilot
//! settings. Settings are stored in TOML format at ~/.superpilot/settings.toml.
//!
//! # Configuration Sections
//!
//! - **core**: log level
//! - **pilot**: identity, execution nature, cycle and retry bounds
//! - **provider**: per-call timeout and retry/backoff policy
//! - **models**: model classification (fast/smart) to model configuration
//! - **prompt_strategy**: which prompt strategy to use and its overrides
//! - **providers**: model provider endpoints (optional per provider)
//! - **abilities**: built-in ability settings
//!
//! A `Settings` value is immutable once handed to a pilot. Factory-style
//! overrides consume the value and return a new one, so two pilots never share
//! a mutable default.
//!
//! # Examples
//!
//! ```no_run
//! use pilot_engine::config::{ExecutionNature, Settings};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::load_or_create()?
//!     .with_execution_nature(ExecutionNature::Sequential);
//! println!("Cycle budget: {}", settings.pilot.max_task_cycle_count);
//! # Ok(())
//! # }
//! ```

use sdk::errors::PilotError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Main settings structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Core settings
    #[serde(default)]
    pub core: CoreConfig,

    /// Pilot identity and loop bounds
    #[serde(default)]
    pub pilot: PilotConfig,

    /// Provider call policy
    #[serde(default)]
    pub provider: ProviderPolicyConfig,

    /// Model classification to model configuration
    #[serde(default = "default_models")]
    pub models: BTreeMap<ModelClassification, ModelConfig>,

    /// Prompt strategy selection
    #[serde(default)]
    pub prompt_strategy: PromptStrategyConfig,

    /// Model provider endpoints
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Built-in abilities
    #[serde(default)]
    pub abilities: AbilitiesConfig,
}

/// Core configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Execution nature: how many and which abilities run per cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionNature {
    /// Every ability, one at a time, in registration order
    Sequential,
    /// Every ability, concurrently, against the same task snapshot
    Parallel,
    /// The model picks one ability per cycle
    Auto,
    /// No abilities, a single prompt/response round trip
    Simple,
}

impl fmt::Display for ExecutionNature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionNature::Sequential => write!(f, "sequential"),
            ExecutionNature::Parallel => write!(f, "parallel"),
            ExecutionNature::Auto => write!(f, "auto"),
            ExecutionNature::Simple => write!(f, "simple"),
        }
    }
}

impl FromStr for ExecutionNature {
    type Err = PilotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "parallel" => Ok(Self::Parallel),
            "auto" => Ok(Self::Auto),
            "simple" => Ok(Self::Simple),
            other => Err(PilotError::Configuration(format!(
                "Invalid execution nature '{}'. Must be one of: sequential, parallel, auto, simple",
                other
            ))),
        }
    }
}

/// Model tier tag decoupling strategy requirements from concrete models
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ModelClassification {
    Fast,
    Smart,
}

impl fmt::Display for ModelClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelClassification::Fast => write!(f, "fast"),
            ModelClassification::Smart => write!(f, "smart"),
        }
    }
}

impl TryFrom<String> for ModelClassification {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_ascii_lowercase().as_str() {
            "fast" | "fast_model" => Ok(Self::Fast),
            "smart" | "smart_model" => Ok(Self::Smart),
            other => Err(format!(
                "unknown model classification '{}', expected 'fast' or 'smart'",
                other
            )),
        }
    }
}

impl From<ModelClassification> for String {
    fn from(value: ModelClassification) -> Self {
        value.to_string()
    }
}

/// Pilot identity and loop bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PilotConfig {
    /// Pilot name
    #[serde(default = "default_pilot_name")]
    pub name: String,

    /// Role description
    #[serde(default = "default_pilot_role")]
    pub role: String,

    /// Pilot goals
    #[serde(default = "default_pilot_goals")]
    pub goals: Vec<String>,

    /// Execution-loop strategy
    #[serde(default = "default_execution_nature")]
    pub execution_nature: ExecutionNature,

    /// Upper bound on completed ability invocations per task
    #[serde(default = "default_max_task_cycle_count")]
    pub max_task_cycle_count: u32,

    /// Retries for malformed replies and failed abilities in single-ability modes
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Re-prompts when the model names an ability that does not exist
    #[serde(default = "default_unknown_ability_retries")]
    pub unknown_ability_retries: u32,
}

impl Default for PilotConfig {
    fn default() -> Self {
        Self {
            name: default_pilot_name(),
            role: default_pilot_role(),
            goals: default_pilot_goals(),
            execution_nature: default_execution_nature(),
            max_task_cycle_count: default_max_task_cycle_count(),
            max_retries: default_max_retries(),
            unknown_ability_retries: default_unknown_ability_retries(),
        }
    }
}

/// Provider call policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderPolicyConfig {
    /// Wall-clock timeout per provider call (seconds)
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,

    /// Retries for retryable provider errors
    #[serde(default = "default_provider_retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff (milliseconds)
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl ProviderPolicyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Default for ProviderPolicyConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_provider_timeout(),
            max_retries: default_provider_retries(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

/// Model configuration for one classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider-specific model identifier
    pub model_name: String,

    /// Provider serving this model (openai, ollama)
    pub provider_name: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl ModelConfig {
    pub fn new(model_name: impl Into<String>, provider_name: impl Into<String>, temperature: f32) -> Self {
        Self {
            model_name: model_name.into(),
            provider_name: provider_name.into(),
            temperature,
        }
    }
}

/// Prompt strategy selection and overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptStrategyConfig {
    /// Registered strategy tag (next_ability, execute_ability, simple, latex_question)
    #[serde(default = "default_strategy_kind")]
    pub kind: String,

    /// Model tier the strategy requires
    #[serde(default = "default_strategy_classification")]
    pub model_classification: ModelClassification,

    /// Override for the system prompt template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_template: Option<String>,

    /// Override for the user prompt template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_prompt_template: Option<String>,

    /// Override for the function schema the reply must conform to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parser_schema: Option<serde_json::Value>,
}

impl PromptStrategyConfig {
    pub fn new(kind: impl Into<String>, model_classification: ModelClassification) -> Self {
        Self {
            kind: kind.into(),
            model_classification,
            system_prompt_template: None,
            user_prompt_template: None,
            parser_schema: None,
        }
    }
}

impl Default for PromptStrategyConfig {
    fn default() -> Self {
        Self::new(default_strategy_kind(), default_strategy_classification())
    }
}

/// Model provider endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// OpenAI-compatible provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai: Option<OpenAIConfig>,

    /// Local Ollama provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ollama: Option<OllamaConfig>,
}

impl ProvidersConfig {
    /// Names of the configured providers
    pub fn names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.openai.is_some() {
            names.push("openai");
        }
        if self.ollama.is_some() {
            names.push("ollama");
        }
        names
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            openai: Some(OpenAIConfig::default()),
            ollama: None,
        }
    }
}

/// OpenAI provider configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAIConfig {
    /// Base URL for the chat completions API
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Environment variable holding the API key
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,

    /// Spend budget in USD; unlimited when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            api_key_env: default_openai_key_env(),
            budget: None,
        }
    }
}

/// Ollama provider configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Base URL for Ollama API
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
        }
    }
}

/// Built-in ability settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AbilitiesConfig {
    #[serde(default)]
    pub web_search: WebSearchConfig,
}

/// Web search ability settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSearchConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Search endpoint (Google Custom Search JSON API shape)
    #[serde(default = "default_search_base_url")]
    pub base_url: String,

    /// Environment variable holding the API key
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    /// Environment variable holding the search engine id
    #[serde(default = "default_search_engine_env")]
    pub engine_id_env: String,

    /// Maximum results per query
    #[serde(default = "default_search_max_results")]
    pub max_results: u32,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_search_base_url(),
            api_key_env: default_search_key_env(),
            engine_id_env: default_search_engine_env(),
            max_results: default_search_max_results(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_pilot_name() -> String {
    "super_task_pilot".to_string()
}

fn default_pilot_role() -> String {
    "An AI Pilot designed to complete simple tasks".to_string()
}

fn default_pilot_goals() -> Vec<String> {
    vec!["Complete simple tasks".to_string()]
}

fn default_execution_nature() -> ExecutionNature {
    ExecutionNature::Auto
}

fn default_max_task_cycle_count() -> u32 {
    3
}

fn default_max_retries() -> u32 {
    2
}

fn default_unknown_ability_retries() -> u32 {
    1
}

fn default_provider_timeout() -> u64 {
    60
}

fn default_provider_retries() -> u32 {
    2
}

fn default_backoff_ms() -> u64 {
    500
}

fn default_temperature() -> f32 {
    0.9
}

fn default_models() -> BTreeMap<ModelClassification, ModelConfig> {
    let mut models = BTreeMap::new();
    models.insert(
        ModelClassification::Fast,
        ModelConfig::new("gpt-3.5-turbo", "openai", default_temperature()),
    );
    models.insert(
        ModelClassification::Smart,
        ModelConfig::new("gpt-4-turbo", "openai", default_temperature()),
    );
    models
}

fn default_strategy_kind() -> String {
    "next_ability".to_string()
}

fn default_strategy_classification() -> ModelClassification {
    ModelClassification::Smart
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_search_base_url() -> String {
    "https://www.googleapis.com/customsearch/v1".to_string()
}

fn default_search_key_env() -> String {
    "GOOGLE_API_KEY".to_string()
}

fn default_search_engine_env() -> String {
    "CUSTOM_SEARCH_ENGINE_ID".to_string()
}

fn default_search_max_results() -> u32 {
    6
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            core: CoreConfig::default(),
            pilot: PilotConfig::default(),
            provider: ProviderPolicyConfig::default(),
            models: default_models(),
            prompt_strategy: PromptStrategyConfig::default(),
            providers: ProvidersConfig::default(),
            abilities: AbilitiesConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings from the default location (~/.superpilot/settings.toml)
    ///
    /// If the file doesn't exist, writes the default settings there first.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The settings file cannot be read or written
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load_or_create() -> Result<Self, PilotError> {
        let path = Self::default_settings_path()?;

        if path.exists() {
            Self::load_from_path(&path)
        } else {
            Self::create_default(&path)
        }
    }

    /// Load settings from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, PilotError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            PilotError::Configuration(format!("Failed to read settings file: {}", e))
        })?;

        Self::from_toml(&contents)
    }

    /// Parse and validate settings from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, PilotError> {
        let settings: Settings = toml::from_str(contents)
            .map_err(|e| PilotError::Configuration(format!("Failed to parse settings: {}", e)))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Write the default settings to `path` and return them
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn create_default(path: &Path) -> Result<Self, PilotError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                PilotError::Configuration(format!("Failed to create settings directory: {}", e))
            })?;
        }

        let settings = Self::default();
        settings.validate()?;

        fs::write(path, settings.to_toml()?).map_err(|e| {
            PilotError::Configuration(format!("Failed to write settings file: {}", e))
        })?;

        Ok(settings)
    }

    /// Serialize to pretty TOML
    pub fn to_toml(&self) -> Result<String, PilotError> {
        toml::to_string_pretty(self)
            .map_err(|e| PilotError::Configuration(format!("Failed to serialize settings: {}", e)))
    }

    /// Get the default settings file path (~/.superpilot/settings.toml)
    pub fn default_settings_path() -> Result<PathBuf, PilotError> {
        let home = dirs::home_dir().ok_or_else(|| {
            PilotError::Configuration("Could not determine home directory".to_string())
        })?;

        Ok(home.join(".superpilot").join("settings.toml"))
    }

    /// Return these settings with a different execution nature
    pub fn with_execution_nature(mut self, nature: ExecutionNature) -> Self {
        self.pilot.execution_nature = nature;
        self
    }

    /// Return these settings with a different prompt strategy
    pub fn with_prompt_strategy(mut self, strategy: PromptStrategyConfig) -> Self {
        self.prompt_strategy = strategy;
        self
    }

    /// Return these settings with a different model table
    pub fn with_models(mut self, models: BTreeMap<ModelClassification, ModelConfig>) -> Self {
        self.models = models;
        self
    }

    /// Return these settings with a different cycle budget
    pub fn with_max_task_cycle_count(mut self, max: u32) -> Self {
        self.pilot.max_task_cycle_count = max;
        self
    }

    /// Validate settings
    ///
    /// Checks that:
    /// - The log level is known
    /// - The cycle budget is at least one
    /// - Every temperature is within [0, 2]
    /// - The prompt strategy's model classification has a model entry
    /// - Every model's provider is configured
    pub fn validate(&self) -> Result<(), PilotError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(PilotError::Configuration(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if self.pilot.max_task_cycle_count == 0 {
            return Err(PilotError::Configuration(
                "max_task_cycle_count must be at least 1".to_string(),
            ));
        }

        for (classification, model) in &self.models {
            if !(0.0..=2.0).contains(&model.temperature) {
                return Err(PilotError::Configuration(format!(
                    "temperature for the {} model must be between 0.0 and 2.0",
                    classification
                )));
            }
        }

        self.model_for(self.prompt_strategy.model_classification)?;

        let configured = self.providers.names();
        for (classification, model) in &self.models {
            if !configured.contains(&model.provider_name.as_str()) {
                return Err(PilotError::Configuration(format!(
                    "The {} model uses provider '{}', which is not configured under [providers]",
                    classification, model.provider_name
                )));
            }
        }

        Ok(())
    }

    /// Look up the model configuration for a classification
    pub fn model_for(&self, classification: ModelClassification) -> Result<&ModelConfig, PilotError> {
        self.models.get(&classification).ok_or_else(|| {
            PilotError::Configuration(format!(
                "No model configured for the {} classification",
                classification
            ))
        })
    }
}

//! Configuration loading, validation, and management for Scaffold.
//!
//! Loads configuration from `~/.scaffold/config.toml` with environment
//! variable overrides. Validates all settings at startup.

pub mod taxonomy;

use scaffold_core::Taxonomy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub use taxonomy::{default_taxonomy, default_taxonomy_toml, load_taxonomy, parse_taxonomy};

/// The root configuration structure.
///
/// Maps directly to `~/.scaffold/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Timeout applied to every external call, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Classification call settings
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Reply generation and post-processing settings
    #[serde(default)]
    pub shaper: ShaperConfig,

    /// Weakness analysis settings
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Conversation log settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Taxonomy source
    #[serde(default)]
    pub taxonomy: TaxonomyConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_request_timeout() -> u64 {
    30
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("classifier", &self.classifier)
            .field("shaper", &self.shaper)
            .field("analysis", &self.analysis)
            .field("store", &self.store)
            .field("taxonomy", &self.taxonomy)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_classifier_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_classifier_temperature")]
    pub temperature: f32,

    /// How many recent records are summarized into the prompt
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

fn default_classifier_max_tokens() -> u32 {
    300
}
fn default_classifier_temperature() -> f32 {
    0.2
}
fn default_history_window() -> usize {
    5
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_classifier_max_tokens(),
            temperature: default_classifier_temperature(),
            history_window: default_history_window(),
        }
    }
}

/// How replies are laid out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presentation {
    /// Each scaffolding type picks its own layout
    #[default]
    Auto,
    /// Always free prose
    Prose,
    /// Always the condensed point list
    Condensed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShaperConfig {
    #[serde(default = "default_shaper_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_shaper_temperature")]
    pub temperature: f32,

    #[serde(default)]
    pub presentation: Presentation,

    /// Language whose fenced code blocks are rewritten to display markup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_language: Option<String>,
}

fn default_shaper_max_tokens() -> u32 {
    600
}
fn default_shaper_temperature() -> f32 {
    0.3
}

impl Default for ShaperConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_shaper_max_tokens(),
            temperature: default_shaper_temperature(),
            presentation: Presentation::Auto,
            code_language: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Minimum leveled interactions before a unit is analyzed
    #[serde(default = "default_min_interactions")]
    pub min_interactions: usize,

    /// How many recent interactions feed the analysis prompt
    #[serde(default = "default_analysis_window")]
    pub window: usize,

    #[serde(default = "default_analysis_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_shaper_temperature")]
    pub temperature: f32,
}

fn default_min_interactions() -> usize {
    3
}
fn default_analysis_window() -> usize {
    5
}
fn default_analysis_max_tokens() -> u32 {
    400
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_interactions: default_min_interactions(),
            window: default_analysis_window(),
            max_tokens: default_analysis_max_tokens(),
            temperature: default_shaper_temperature(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "sqlite" or "memory"
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// SQLite database path (defaults to ~/.scaffold/conversations.sqlite)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

fn default_store_backend() -> String {
    "sqlite".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaxonomyConfig {
    /// Path to a taxonomy TOML file; the built-in course is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.scaffold/config.toml).
    ///
    /// Also checks environment variables:
    /// - `SCAFFOLD_API_KEY` (highest priority), `OPENAI_API_KEY`, `OPENROUTER_API_KEY`
    /// - `SCAFFOLD_PROVIDER`, `SCAFFOLD_MODEL`, `SCAFFOLD_DB`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("SCAFFOLD_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                .or_else(|| std::env::var("OPENROUTER_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("SCAFFOLD_PROVIDER") {
            config.default_provider = provider;
        }

        if let Ok(model) = std::env::var("SCAFFOLD_MODEL") {
            config.default_model = model;
        }

        if let Ok(db) = std::env::var("SCAFFOLD_DB") {
            config.store.path = Some(db);
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".scaffold")
    }

    /// Resolved SQLite database path.
    pub fn database_path(&self) -> PathBuf {
        self.store
            .path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| Self::config_dir().join("conversations.sqlite"))
    }

    /// Load the configured taxonomy, or the built-in one.
    pub fn load_taxonomy(&self) -> Result<Taxonomy, ConfigError> {
        match &self.taxonomy.path {
            Some(path) => load_taxonomy(Path::new(path)),
            None => Ok(default_taxonomy()),
        }
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let temperatures = [
            ("classifier.temperature", self.classifier.temperature),
            ("shaper.temperature", self.shaper.temperature),
            ("analysis.temperature", self.analysis.temperature),
        ];
        for (name, value) in temperatures {
            if !(0.0..=2.0).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be between 0.0 and 2.0"
                )));
            }
        }

        if self.classifier.max_tokens == 0 || self.shaper.max_tokens == 0 || self.analysis.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "token budgets must be greater than 0".into(),
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }

        if !matches!(self.store.backend.as_str(), "sqlite" | "memory") {
            return Err(ConfigError::ValidationError(format!(
                "unknown store backend: {}",
                self.store.backend
            )));
        }

        Ok(())
    }

    /// The model to request: the default provider's own `default_model`
    /// when set, otherwise the top-level `default_model`.
    pub fn active_model(&self) -> &str {
        self.providers
            .get(&self.default_provider)
            .and_then(|p| p.default_model.as_deref())
            .unwrap_or(&self.default_model)
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            request_timeout_secs: default_request_timeout(),
            classifier: ClassifierConfig::default(),
            shaper: ShaperConfig::default(),
            analysis: AnalysisConfig::default(),
            store: StoreConfig::default(),
            taxonomy: TaxonomyConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Invalid taxonomy: {0}")]
    Taxonomy(String),
}

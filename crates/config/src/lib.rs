//! Configuration loading, validation, and credential resolution for DeepDive.
//!
//! Loads configuration from `~/.deepdive/config.toml` (or an explicit path),
//! then applies environment variable overrides. A `.env` file in the working
//! directory is loaded first, so keys can live there. Everything is validated
//! once at startup; a missing credential is a startup error, never a runtime
//! one.

use deepdive_core::agent::{SamplingConfig, ToolChoice};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.deepdive/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model provider: "gemini", "openai", "openrouter" or "ollama"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Default model for every agent without its own override
    #[serde(default = "default_model")]
    pub model: String,

    /// Override the provider's base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Model API key (usually taken from the environment)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Web search settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Execution loop limits
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Per-agent overrides keyed by agent key
    /// ("director", "facts_finder", "source_checker", "report_writer")
    #[serde(default)]
    pub agents: HashMap<String, AgentOverride>,
}

fn default_provider() -> String {
    "gemini".into()
}
fn default_model() -> String {
    "gemini-2.5-flash".into()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("search", &self.search)
            .field("runner", &self.runner)
            .field("agents", &self.agents)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Tavily API key (usually taken from `TAVILY_API_KEY`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_search_url")]
    pub api_url: String,

    /// Results returned per query unless the model asks for fewer
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_search_url() -> String {
    "https://api.tavily.com".into()
}
fn default_max_results() -> usize {
    5
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("max_results", &self.max_results)
            .finish()
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_search_url(),
            max_results: default_max_results(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Model turns per loop invocation before it aborts
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    /// Wall-clock limit for the whole research run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

fn default_max_turns() -> u32 {
    25
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            timeout_secs: None,
        }
    }
}

/// Optional per-agent sampling and budget overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<u32>,
}

impl AgentOverride {
    /// Layer this override on top of an agent's built-in sampling.
    pub fn apply(&self, base: SamplingConfig) -> SamplingConfig {
        SamplingConfig {
            temperature: self.temperature.unwrap_or(base.temperature),
            max_tokens: self.max_tokens.unwrap_or(base.max_tokens),
            tool_choice: self.tool_choice.unwrap_or(base.tool_choice),
        }
    }
}

/// Credentials resolved at startup.
#[derive(Clone)]
pub struct Credentials {
    pub model_api_key: String,
    pub search_api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("model_api_key", &"[REDACTED]")
            .field("search_api_key", &"[REDACTED]")
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.deepdive/config.toml).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(None)
    }

    /// Load `.env`, the config file (explicit path or default), then apply
    /// environment variable overrides.
    ///
    /// Environment variables:
    /// - `DEEPDIVE_API_KEY` (highest priority), then the provider's own key
    ///   (`GEMINI_API_KEY`, `OPENAI_API_KEY`, `OPENROUTER_API_KEY`)
    /// - `TAVILY_API_KEY`
    /// - `DEEPDIVE_PROVIDER`, `DEEPDIVE_MODEL`, `DEEPDIVE_MAX_TURNS`
    pub fn load_with(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Ok(env_file) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", env_file.display());
        }

        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_dir().join("config.toml"),
        };
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
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

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(provider) = lookup("DEEPDIVE_PROVIDER") {
            self.provider = provider;
        }

        if let Some(model) = lookup("DEEPDIVE_MODEL") {
            self.model = model;
        }

        if let Some(turns) = lookup("DEEPDIVE_MAX_TURNS") {
            self.runner.max_turns = turns.parse().map_err(|_| {
                ConfigError::ValidationError(format!("DEEPDIVE_MAX_TURNS must be a number, got '{turns}'"))
            })?;
        }

        if let Some(key) = lookup("DEEPDIVE_API_KEY") {
            self.api_key = Some(key);
        } else if self.api_key.is_none() {
            self.api_key = provider_key_var(&self.provider).and_then(&lookup);
        }

        if self.search.api_key.is_none() {
            self.search.api_key = lookup("TAVILY_API_KEY");
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".deepdive")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.runner.max_turns == 0 {
            return Err(ConfigError::ValidationError(
                "runner.max_turns must be at least 1".into(),
            ));
        }

        if !(1..=20).contains(&self.search.max_results) {
            return Err(ConfigError::ValidationError(
                "search.max_results must be between 1 and 20".into(),
            ));
        }

        for (name, agent) in &self.agents {
            if let Some(t) = agent.temperature {
                if !(0.0..=2.0).contains(&t) {
                    return Err(ConfigError::ValidationError(format!(
                        "agents.{name}.temperature must be between 0.0 and 2.0"
                    )));
                }
            }
            if agent.max_turns == Some(0) {
                return Err(ConfigError::ValidationError(format!(
                    "agents.{name}.max_turns must be at least 1"
                )));
            }
        }

        Ok(())
    }

    /// Resolve the credentials the research run needs.
    ///
    /// Local providers (ollama) need no model key.
    pub fn require_credentials(&self) -> Result<Credentials, ConfigError> {
        let model_api_key = match (&self.api_key, provider_key_var(&self.provider)) {
            (Some(key), _) => key.clone(),
            (None, None) => String::new(),
            (None, Some(var)) => {
                return Err(ConfigError::MissingCredential {
                    name: format!("{} API key", self.provider),
                    env_var: var.to_string(),
                });
            }
        };

        let search_api_key = self.search.api_key.clone().ok_or_else(|| {
            ConfigError::MissingCredential {
                name: "Tavily API key".into(),
                env_var: "TAVILY_API_KEY".into(),
            }
        })?;

        Ok(Credentials {
            model_api_key,
            search_api_key,
        })
    }

    /// Override for one agent, if configured.
    pub fn agent(&self, key: &str) -> Option<&AgentOverride> {
        self.agents.get(key)
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_url: None,
            api_key: None,
            search: SearchConfig::default(),
            runner: RunnerConfig::default(),
            agents: HashMap::new(),
        }
    }
}

/// The environment variable holding the API key for `provider`.
fn provider_key_var(provider: &str) -> Option<&'static str> {
    match provider {
        "gemini" => Some("GEMINI_API_KEY"),
        "openai" => Some("OPENAI_API_KEY"),
        "openrouter" => Some("OPENROUTER_API_KEY"),
        "ollama" => None,
        _ => Some("DEEPDIVE_API_KEY"),
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

    #[error("Missing {name}: set the {env_var} environment variable")]
    MissingCredential { name: String, env_var: String },
}

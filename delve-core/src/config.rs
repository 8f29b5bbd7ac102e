//! Configuration system for Delve.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from `~/.config/delve/config.toml` and/or `.delve/config.toml`
//! in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Top-level configuration for Delve.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DelveConfig {
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub fetch: FetchConfig,
    pub research: ResearchConfig,
    pub session: SessionConfig,
}

/// LLM provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name: "anthropic" or "openai" (any other value is treated as OpenAI-compatible).
    pub provider: String,
    /// Model identifier (e.g., "claude-sonnet-4-20250514", "gpt-4o").
    pub model: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Optional base URL override for the API endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Maximum tokens to generate in a response.
    pub max_tokens: usize,
    /// Sampling temperature.
    pub temperature: f32,
    /// HTTP timeout for a single completion call.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: None,
            max_tokens: 4096,
            temperature: 0.3,
            timeout_secs: 120,
        }
    }
}

impl LlmConfig {
    /// Validate this LLM config and return any warnings.
    ///
    /// Returns an empty Vec if the config is valid; never errors.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.temperature < 0.0 || self.temperature > 2.0 {
            warnings.push(format!(
                "temperature ({}) is outside the typical range 0.0-2.0",
                self.temperature
            ));
        }
        if self.max_tokens < 1024 {
            warnings.push(format!(
                "max_tokens ({}) is low; synthesis output may be truncated",
                self.max_tokens
            ));
        }
        warnings
    }
}

/// Web search gateway configuration (Google Programmable Search).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Environment variable holding the search API key.
    pub api_key_env: String,
    /// Environment variable holding the programmable search engine id (`cx`).
    pub engine_id_env: String,
    /// Optional endpoint override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: "GOOGLE_SEARCH_API_KEY".to_string(),
            engine_id_env: "GOOGLE_SEARCH_ENGINE_ID".to_string(),
            base_url: None,
            timeout_secs: 15,
        }
    }
}

/// Content fetcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub max_redirects: usize,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            max_redirects: 5,
            user_agent: concat!("Delve/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Tunables for the four research phases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// `maxResults` passed to every search call.
    pub results_per_query: usize,
    /// Ceiling on flattened search results per investigation strategy.
    pub max_results_per_strategy: usize,
    /// Maximum characters kept from each fetched page.
    pub fetch_max_length: usize,
    /// Fetched bodies shorter than this (in characters) are dropped.
    pub min_content_length: usize,
    /// Inclusive range of queries requested during the initial search.
    pub initial_query_count: (usize, usize),
    /// Inclusive range of queries requested per investigation strategy.
    pub strategy_query_count: (usize, usize),
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            results_per_query: 10,
            max_results_per_strategy: 9,
            fetch_max_length: 10_000,
            min_content_length: 100,
            initial_query_count: (4, 6),
            strategy_query_count: (2, 3),
        }
    }
}

impl ResearchConfig {
    /// Reject values the leaf services or phases cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.results_per_query) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "research.results_per_query must be within 1..=100, got {}",
                    self.results_per_query
                ),
            });
        }
        if self.max_results_per_strategy == 0 {
            return Err(ConfigError::Invalid {
                message: "research.max_results_per_strategy must be at least 1".to_string(),
            });
        }
        for (name, (lo, hi)) in [
            ("initial_query_count", self.initial_query_count),
            ("strategy_query_count", self.strategy_query_count),
        ] {
            if lo == 0 || lo > hi {
                return Err(ConfigError::Invalid {
                    message: format!("research.{name} must be a non-empty range, got ({lo}, {hi})"),
                });
            }
        }
        Ok(())
    }
}

/// Session recording configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Whether state snapshots and prompt/response pairs are written to disk.
    pub enabled: bool,
    /// Base directory for recorded sessions. Defaults to the platform data dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: None,
        }
    }
}

impl SessionConfig {
    /// Resolve the directory sessions are recorded under.
    pub fn resolved_directory(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(|| {
            directories::ProjectDirs::from("dev", "delve", "delve")
                .map(|d| d.data_dir().join("sessions"))
                .unwrap_or_else(|| PathBuf::from(".delve").join("sessions"))
        })
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `DELVE_`)
/// 3. Workspace-local config (`.delve/config.toml`)
/// 4. User config (`~/.config/delve/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&DelveConfig>,
) -> Result<DelveConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(DelveConfig::default()));

    // User-level config
    if let Some(config_dir) = directories::ProjectDirs::from("dev", "delve", "delve") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    // Workspace-level config
    if let Some(ws) = workspace {
        let ws_config = ws.join(".delve").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // Environment variables (DELVE_LLM__MODEL, DELVE_RESEARCH__FETCH_MAX_LENGTH, etc.)
    figment = figment.merge(Env::prefixed("DELVE_").split("__"));

    // Explicit overrides
    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

/// Render a configuration as TOML.
pub fn to_toml_string(config: &DelveConfig) -> Result<String, ConfigError> {
    toml::to_string_pretty(config).map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })
}

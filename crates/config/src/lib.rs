//! Configuration loading, validation, and management for Worksmith.
//!
//! Loads configuration from `~/.worksmith/config.toml` with environment
//! variable overrides (`WORKSMITH_<SECTION>_<FIELD>`). Validates all
//! settings at load.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use worksmith_core::error::ConfigError;

/// The root configuration structure.
///
/// Maps directly to `~/.worksmith/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// LLM provider settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Numeric limits for the conversation loop and compaction
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Behavior toggles
    #[serde(default)]
    pub toggles: TogglesConfig,

    /// External tool executor endpoint (used by the CLI)
    #[serde(default)]
    pub executor: ExecutorConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            limits: LimitsConfig::default(),
            toggles: TogglesConfig::default(),
            executor: ExecutorConfig::default(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider name: "openai" (any OpenAI-compatible endpoint) or "deepseek"
    #[serde(default = "default_provider_name")]
    pub name: String,

    /// API key; may also come from WORKSMITH_PROVIDER_API_KEY
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL override (e.g. a proxy or a self-hosted endpoint)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Model to use
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature; kept low for deterministic command execution
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            api_key: None,
            api_url: None,
            model: default_model(),
            temperature: default_temperature(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Hard ceiling on tool-calling rounds per command
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: u32,

    /// Token budget while more tool rounds are expected
    #[serde(default = "default_tool_round_max_tokens")]
    pub tool_round_max_tokens: u32,

    /// Token budget once a tool result is already in the conversation
    #[serde(default = "default_final_round_max_tokens")]
    pub final_round_max_tokens: u32,

    /// Identical non-search calls at or above this count terminate the loop
    #[serde(default = "default_repeat_call_threshold")]
    pub repeat_call_threshold: u32,

    /// Consecutive same-tool failures at this count are terminal
    #[serde(default = "default_consecutive_error_threshold")]
    pub consecutive_error_threshold: u32,

    /// Compaction: max characters per string
    #[serde(default = "default_compact_max_string")]
    pub compact_max_string: usize,

    /// Compaction: max items per array
    #[serde(default = "default_compact_max_items")]
    pub compact_max_items: usize,

    /// Compaction: max keys per object
    #[serde(default = "default_compact_max_keys")]
    pub compact_max_keys: usize,

    /// Compaction: max recursion depth
    #[serde(default = "default_compact_max_depth")]
    pub compact_max_depth: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_tool_iterations: default_max_tool_iterations(),
            tool_round_max_tokens: default_tool_round_max_tokens(),
            final_round_max_tokens: default_final_round_max_tokens(),
            repeat_call_threshold: default_repeat_call_threshold(),
            consecutive_error_threshold: default_consecutive_error_threshold(),
            compact_max_string: default_compact_max_string(),
            compact_max_items: default_compact_max_items(),
            compact_max_keys: default_compact_max_keys(),
            compact_max_depth: default_compact_max_depth(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TogglesConfig {
    /// Compact tool results before echoing them into the conversation
    #[serde(default = "default_true")]
    pub compact_tool_results: bool,

    /// Skip the redundant final model call after an all-success write or
    /// search round
    #[serde(default = "default_true")]
    pub skip_final_summary_round: bool,

    /// Trim core search tools down to the intent when classification is
    /// confidently narrow
    #[serde(default = "default_true")]
    pub trim_tools_to_intent: bool,
}

impl Default for TogglesConfig {
    fn default() -> Self {
        Self {
            compact_tool_results: true,
            skip_final_summary_round: true,
            trim_tools_to_intent: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Base URL of the tool executor service
    #[serde(default = "default_executor_url")]
    pub url: String,

    /// Bearer token for the executor service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            url: default_executor_url(),
            token: None,
        }
    }
}

fn default_provider_name() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_max_tool_iterations() -> u32 {
    8
}
fn default_tool_round_max_tokens() -> u32 {
    1024
}
fn default_final_round_max_tokens() -> u32 {
    4096
}
fn default_repeat_call_threshold() -> u32 {
    2
}
fn default_consecutive_error_threshold() -> u32 {
    3
}
fn default_compact_max_string() -> usize {
    400
}
fn default_compact_max_items() -> usize {
    20
}
fn default_compact_max_keys() -> usize {
    30
}
fn default_compact_max_depth() -> usize {
    4
}
fn default_executor_url() -> String {
    "http://localhost:8090".into()
}
fn default_true() -> bool {
    true
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("provider", &self.provider)
            .field("limits", &self.limits)
            .field("toggles", &self.toggles)
            .field("executor", &self.executor)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl EngineConfig {
    /// Default config file location.
    pub fn default_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
        Path::new(&home).join(".worksmith").join("config.toml")
    }

    /// Load configuration: file (if present) → env overrides → validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);

        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            toml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `WORKSMITH_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("WORKSMITH_PROVIDER_NAME") {
            self.provider.name = v;
        }
        if let Ok(v) = std::env::var("WORKSMITH_PROVIDER_API_KEY") {
            self.provider.api_key = Some(v);
        }
        if let Ok(v) = std::env::var("WORKSMITH_PROVIDER_API_URL") {
            self.provider.api_url = Some(v);
        }
        if let Ok(v) = std::env::var("WORKSMITH_PROVIDER_MODEL") {
            self.provider.model = v;
        }
        if let Ok(v) = std::env::var("WORKSMITH_LIMITS_MAX_TOOL_ITERATIONS") {
            if let Ok(n) = v.parse() {
                self.limits.max_tool_iterations = n;
            }
        }
        if let Ok(v) = std::env::var("WORKSMITH_TOGGLES_COMPACT_TOOL_RESULTS") {
            self.toggles.compact_tool_results = v != "0" && v.to_lowercase() != "false";
        }
        if let Ok(v) = std::env::var("WORKSMITH_TOGGLES_SKIP_FINAL_SUMMARY_ROUND") {
            self.toggles.skip_final_summary_round = v != "0" && v.to_lowercase() != "false";
        }
        if let Ok(v) = std::env::var("WORKSMITH_TOGGLES_TRIM_TOOLS_TO_INTENT") {
            self.toggles.trim_tools_to_intent = v != "0" && v.to_lowercase() != "false";
        }
        if let Ok(v) = std::env::var("WORKSMITH_EXECUTOR_URL") {
            self.executor.url = v;
        }
        if let Ok(v) = std::env::var("WORKSMITH_EXECUTOR_TOKEN") {
            self.executor.token = Some(v);
        }
    }

    /// Validate settings that would otherwise fail deep inside an execution.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_tool_iterations == 0 {
            return Err(ConfigError::Invalid(
                "limits.max_tool_iterations must be at least 1".into(),
            ));
        }
        if self.limits.repeat_call_threshold < 2 {
            return Err(ConfigError::Invalid(
                "limits.repeat_call_threshold must be at least 2".into(),
            ));
        }
        if self.limits.compact_max_depth == 0 {
            return Err(ConfigError::Invalid(
                "limits.compact_max_depth must be at least 1".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(ConfigError::Invalid(
                "provider.temperature must be in [0, 2]".into(),
            ));
        }
        match self.provider.name.as_str() {
            "openai" | "deepseek" => Ok(()),
            other => Err(ConfigError::UnknownProvider(other.into())),
        }
    }
}

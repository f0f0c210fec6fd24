//! Error types for the Worksmith domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Worksmith operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Engine errors ---
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    // --- Configuration errors ---
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Empty response: provider returned no choices")]
    EmptyResponse,

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool executor unreachable: {0}")]
    ExecutorUnreachable(String),
}

/// Terminal conditions of the conversation loop that are distinguished from
/// true errors: both report the partial progress made before stopping.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("Maximum tool iterations ({0}) reached")]
    IterationCeiling(u32),

    #[error("Repeated tool call detected: {tool} called {count} times with identical arguments")]
    RepeatedCall { tool: String, count: u32 },

    #[error("Tool {tool} failed {count} consecutive times")]
    ConsecutiveFailures { tool: String, count: u32 },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No API key configured for provider '{0}'")]
    MissingApiKey(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to read config file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse config file: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn engine_error_displays_correctly() {
        let err = Error::Engine(EngineError::RepeatedCall {
            tool: "updateTask".into(),
            count: 2,
        });
        assert!(err.to_string().contains("updateTask"));
        assert!(err.to_string().contains("2"));
    }

    #[test]
    fn config_error_displays_correctly() {
        let err = Error::Config(ConfigError::MissingApiKey("deepseek".into()));
        assert!(err.to_string().contains("deepseek"));
    }
}

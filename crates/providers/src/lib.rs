//! LLM Provider implementations for Worksmith.
//!
//! All providers implement the `worksmith_core::Provider` trait. The two
//! backends differ only in request construction — they share one response
//! wire shape, parsed in `wire`.

use std::sync::Arc;

use worksmith_core::Provider;
use worksmith_core::error::ConfigError;
use worksmith_config::EngineConfig;

pub mod deepseek;
pub mod openai_compat;
mod wire;

pub use deepseek::DeepseekProvider;
pub use openai_compat::OpenAiCompatProvider;

/// Select and construct the configured provider.
///
/// A missing API key is a configuration error raised here, before any model
/// call is attempted.
pub fn provider_from_config(config: &EngineConfig) -> Result<Arc<dyn Provider>, ConfigError> {
    let api_key = config
        .provider
        .api_key
        .clone()
        .ok_or_else(|| ConfigError::MissingApiKey(config.provider.name.clone()))?;

    match config.provider.name.as_str() {
        "openai" => Ok(Arc::new(OpenAiCompatProvider::new(
            "openai",
            config
                .provider
                .api_url
                .as_deref()
                .unwrap_or("https://api.openai.com/v1"),
            api_key,
        ))),
        "deepseek" => Ok(Arc::new(DeepseekProvider::new(
            config.provider.api_url.as_deref(),
            api_key,
        ))),
        other => Err(ConfigError::UnknownProvider(other.into())),
    }
}

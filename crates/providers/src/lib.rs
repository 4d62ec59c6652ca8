//! Model Client implementations for DeepDive.
//!
//! All providers implement the `deepdive_core::Provider` trait.
//! [`build_from_config`] picks the endpoint named in the configuration.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use std::sync::Arc;

use deepdive_config::AppConfig;
use deepdive_core::provider::Provider;

/// Build the configured Model Client.
///
/// `api_key` is the credential already resolved at startup.
pub fn build_from_config(config: &AppConfig, api_key: &str) -> Arc<dyn Provider> {
    let base_url = config
        .api_url
        .clone()
        .unwrap_or_else(|| default_base_url(&config.provider));

    tracing::debug!(provider = %config.provider, %base_url, "Building model client");
    Arc::new(OpenAiCompatProvider::new(&config.provider, base_url, api_key))
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "gemini" => openai_compat::GEMINI_BASE_URL.into(),
        "openai" => openai_compat::OPENAI_BASE_URL.into(),
        "openrouter" => openai_compat::OPENROUTER_BASE_URL.into(),
        "ollama" => openai_compat::OLLAMA_BASE_URL.into(),
        _ => openai_compat::GEMINI_BASE_URL.into(),
    }
}

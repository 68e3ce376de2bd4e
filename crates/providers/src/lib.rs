//! LLM provider implementations for FileScout.
//!
//! All providers implement the `filescout_core::Provider` trait.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use filescout_config::AppConfig;
use filescout_core::Provider;
use filescout_core::error::ProviderError;
use std::sync::Arc;

/// Build the shared provider selected by configuration.
pub fn provider_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let provider = OpenAiCompatProvider::from_config(config)?;
    tracing::debug!(
        provider = %config.provider,
        base_url = %provider.base_url(),
        model = %config.model,
        "Provider configured"
    );
    Ok(Arc::new(provider))
}

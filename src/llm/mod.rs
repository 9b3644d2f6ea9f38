//! Language-model capability boundary
//!
//! Everything above this module sees a single operation,
//! `complete(prompt, max_tokens) -> text`. Provider selection and
//! fallback order are configuration.

mod fallback;
mod http;

pub use fallback::FallbackCompletion;
pub use http::HttpCompletion;
pub(crate) use http::truncate;

use crate::config::{resolve_api_keys_from_env, ModelsConfig};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Text completion capability
#[async_trait]
pub trait Completion: Send + Sync {
    /// Complete a single prompt
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String>;

    /// Provider name (for logs)
    fn name(&self) -> &str;
}

/// Bound a capability call by `secs`, mapping expiry to `Error::Timeout`
pub async fn with_timeout<T, F>(secs: u64, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(Duration::from_secs(secs), fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(secs)),
    }
}

/// Build the configured provider chain.
///
/// Providers whose API key is not set are skipped; an error is returned if
/// none remain.
pub fn from_config(config: &ModelsConfig) -> Result<Arc<dyn Completion>> {
    let keys = resolve_api_keys_from_env(config);
    let mut providers: Vec<Arc<dyn Completion>> = Vec::new();

    for provider in &config.providers {
        match keys.get(&provider.name) {
            Some(key) => {
                providers.push(Arc::new(HttpCompletion::new(
                    provider,
                    key.clone(),
                    config.timeout_secs,
                )?));
            }
            None => {
                tracing::warn!(
                    "No API key for model provider {} (${}), skipping",
                    provider.name,
                    provider.api_key_ref.to_uppercase()
                );
            }
        }
    }

    if providers.is_empty() {
        return Err(Error::Config(
            "no model provider has an API key configured".to_string(),
        ));
    }

    Ok(Arc::new(FallbackCompletion::new(providers)))
}

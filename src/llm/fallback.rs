//! Ordered provider fallback

use super::Completion;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Tries each provider in order until one succeeds
pub struct FallbackCompletion {
    providers: Vec<Arc<dyn Completion>>,
}

impl FallbackCompletion {
    pub fn new(providers: Vec<Arc<dyn Completion>>) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl Completion for FallbackCompletion {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let mut last_error = None;
        for provider in &self.providers {
            match provider.complete(prompt, max_tokens).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    tracing::warn!("Model provider {} failed: {}", provider.name(), e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| Error::Llm("no model providers configured".to_string())))
    }

    fn name(&self) -> &str {
        "fallback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticCompletion;

    #[tokio::test]
    async fn test_first_success_wins() {
        let chain = FallbackCompletion::new(vec![
            Arc::new(StaticCompletion::failing()),
            Arc::new(StaticCompletion::new("second")),
            Arc::new(StaticCompletion::new("third")),
        ]);
        assert_eq!(chain.complete("p", 10).await.unwrap(), "second");
    }

    #[tokio::test]
    async fn test_all_fail() {
        let chain = FallbackCompletion::new(vec![
            Arc::new(StaticCompletion::failing()),
            Arc::new(StaticCompletion::failing()),
        ]);
        assert!(chain.complete("p", 10).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_chain() {
        let chain = FallbackCompletion::new(vec![]);
        assert!(matches!(chain.complete("p", 10).await, Err(Error::Llm(_))));
    }
}

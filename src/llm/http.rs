//! HTTP model providers (Anthropic Messages and OpenAI Chat Completions)

use super::Completion;
use crate::config::{ModelProviderConfig, ProviderKind};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Value};
use std::time::Duration;

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// A single HTTP completion provider
pub struct HttpCompletion {
    name: String,
    kind: ProviderKind,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl HttpCompletion {
    /// Create a provider client with the given API key
    pub fn new(config: &ModelProviderConfig, api_key: String, timeout_secs: u64) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let invalid_key = |e: reqwest::header::InvalidHeaderValue| {
            Error::Config(format!("invalid API key for {}: {}", config.name, e))
        };
        match config.kind {
            ProviderKind::Anthropic => {
                headers.insert(
                    "x-api-key",
                    HeaderValue::from_str(api_key.trim()).map_err(invalid_key)?,
                );
                headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));
            }
            ProviderKind::Openai => {
                headers.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
                        .map_err(invalid_key)?,
                );
            }
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| match config.kind {
                ProviderKind::Anthropic => ANTHROPIC_BASE_URL.to_string(),
                ProviderKind::Openai => OPENAI_BASE_URL.to_string(),
            });

        Ok(Self {
            name: config.name.clone(),
            kind: config.kind,
            model: config.model.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        match self.kind {
            ProviderKind::Anthropic => format!("{}/messages", self.base_url),
            ProviderKind::Openai => format!("{}/chat/completions", self.base_url),
        }
    }

    fn request_body(&self, prompt: &str, max_tokens: u32) -> Value {
        json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "messages": [{ "role": "user", "content": prompt }],
        })
    }
}

#[async_trait]
impl Completion for HttpCompletion {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint())
            .json(&self.request_body(prompt, max_tokens))
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;
        if !status.is_success() {
            return Err(Error::Llm(format!(
                "{} returned HTTP {}: {}",
                self.name,
                status.as_u16(),
                truncate(&raw, 200)
            )));
        }

        let body: Value = serde_json::from_str(&raw)?;
        extract_text(self.kind, &body)
            .ok_or_else(|| Error::Llm(format!("{} response carried no text", self.name)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Pull the completion text out of a provider response body
fn extract_text(kind: ProviderKind, body: &Value) -> Option<String> {
    match kind {
        ProviderKind::Anthropic => {
            let text: String = body["content"]
                .as_array()?
                .iter()
                .filter(|block| block["type"] == "text")
                .filter_map(|block| block["text"].as_str())
                .collect::<Vec<_>>()
                .join("");
            Some(text)
        }
        ProviderKind::Openai => body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string),
    }
}

pub(crate) fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(kind: ProviderKind, base_url: Option<&str>) -> HttpCompletion {
        let config = ModelProviderConfig {
            name: "test".to_string(),
            kind,
            api_key_ref: "unused".to_string(),
            base_url: base_url.map(str::to_string),
            model: "model-x".to_string(),
        };
        HttpCompletion::new(&config, "sk-test".to_string(), 5).unwrap()
    }

    #[test]
    fn test_endpoints() {
        assert_eq!(
            provider(ProviderKind::Anthropic, None).endpoint(),
            "https://api.anthropic.com/v1/messages"
        );
        assert_eq!(
            provider(ProviderKind::Openai, Some("http://localhost:8080/v1/")).endpoint(),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn test_request_body() {
        let body = provider(ProviderKind::Openai, None).request_body("hi", 16);
        assert_eq!(body["model"], "model-x");
        assert_eq!(body["max_tokens"], 16);
        assert_eq!(body["messages"][0]["content"], "hi");
    }

    #[test]
    fn test_extract_anthropic_text() {
        let body = json!({
            "content": [
                {"type": "text", "text": "YES"},
                {"type": "tool_use", "id": "x"},
                {"type": "text", "text": "!"}
            ]
        });
        assert_eq!(
            extract_text(ProviderKind::Anthropic, &body).as_deref(),
            Some("YES!")
        );
    }

    #[test]
    fn test_extract_openai_text() {
        let body = json!({"choices": [{"message": {"content": "NO"}}]});
        assert_eq!(extract_text(ProviderKind::Openai, &body).as_deref(), Some("NO"));
        assert!(extract_text(ProviderKind::Openai, &json!({})).is_none());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("abc", 3), "abc");
    }
}

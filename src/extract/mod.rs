//! Thread memory extraction
//!
//! Turns a chat thread into typed memory items with one completion call.
//! Parsing is defensive: a malformed or adversarial reply yields an empty
//! list, and individual items without a valid `type` or `content` are
//! dropped.

use crate::llm::{truncate, with_timeout, Completion};
use crate::records::{ExtractedMemory, MemoryType, ThreadMessage};
use serde_json::Value;
use std::sync::Arc;

/// Token budget for the extraction reply
const EXTRACT_MAX_TOKENS: u32 = 2048;

/// Characters of a bad reply kept in the log
const LOG_RESPONSE_CHARS: usize = 500;

/// Extracts memory items from chat threads
pub struct ThreadExtractor {
    completion: Arc<dyn Completion>,
    bot_user_id: String,
    timeout_secs: u64,
}

impl ThreadExtractor {
    pub fn new(
        completion: Arc<dyn Completion>,
        bot_user_id: impl Into<String>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            completion,
            bot_user_id: bot_user_id.into(),
            timeout_secs,
        }
    }

    /// Extract memory items from `messages`, in the model's order
    pub async fn extract(&self, messages: &[ThreadMessage], channel: &str) -> Vec<ExtractedMemory> {
        let human: Vec<&ThreadMessage> = messages
            .iter()
            .filter(|m| m.author_id != self.bot_user_id && !m.text.trim().is_empty())
            .collect();
        if human.is_empty() {
            return Vec::new();
        }

        let prompt = build_prompt(&human, channel);
        let reply = with_timeout(
            self.timeout_secs,
            self.completion.complete(&prompt, EXTRACT_MAX_TOKENS),
        )
        .await;

        match reply {
            Ok(raw) => parse_memories(&raw),
            Err(e) => {
                tracing::warn!("Thread extraction failed in #{}: {}", channel, e);
                Vec::new()
            }
        }
    }
}

fn build_prompt(messages: &[&ThreadMessage], channel: &str) -> String {
    let types = MemoryType::ALL
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let transcript = messages
        .iter()
        .map(|m| format!("<@{}>: {}", m.author_id, m.text.trim()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Extract the things worth remembering from this conversation in #{channel}.\n\n\
         Return ONLY a JSON array. Each element is an object with:\n\
         - \"type\": one of {types}\n\
         - \"content\": one self-contained sentence\n\
         - \"context\": optional short note on why it matters\n\
         - \"tags\": optional array of short lowercase keywords\n\n\
         If nothing is worth remembering, return [].\n\n\
         Conversation:\n{transcript}"
    )
}

/// Remove a surrounding Markdown code fence, if any
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the info string (```json)
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse a model reply into memory items, never failing
pub fn parse_memories(raw: &str) -> Vec<ExtractedMemory> {
    let body = strip_code_fence(raw);
    let items = match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(items)) => items,
        Ok(_) => {
            tracing::warn!(
                "Extraction reply is not a JSON array: {}",
                truncate(raw, LOG_RESPONSE_CHARS)
            );
            return Vec::new();
        }
        Err(e) => {
            tracing::warn!(
                "Failed to parse extraction reply: {}: {}",
                e,
                truncate(raw, LOG_RESPONSE_CHARS)
            );
            return Vec::new();
        }
    };

    let total = items.len();
    let memories: Vec<ExtractedMemory> = items.iter().filter_map(parse_item).collect();
    if memories.len() < total {
        tracing::debug!(
            dropped = total - memories.len(),
            "Dropped invalid extracted items"
        );
    }
    memories
}

fn parse_item(item: &Value) -> Option<ExtractedMemory> {
    let memory_type = item.get("type")?.as_str()?.parse::<MemoryType>().ok()?;
    let content = item.get("content")?.as_str()?.trim();
    if content.is_empty() {
        return None;
    }
    let context = item
        .get("context")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string);
    let tags = item
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some(ExtractedMemory {
        memory_type,
        content: content.to_string(),
        context,
        tags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticCompletion;

    fn thread() -> Vec<ThreadMessage> {
        vec![
            ThreadMessage::new("U1", "Should we ship on Friday?"),
            ThreadMessage::new("U2", "Yes, Friday. Dana owns the changelog."),
            ThreadMessage::new("UBOT", "I can help with that!"),
        ]
    }

    #[tokio::test]
    async fn test_extracts_valid_items() {
        let reply = r#"```json
[
  {"type": "decision", "content": "Ship on Friday", "tags": ["release"]},
  {"type": "action", "content": "Dana owns the changelog", "context": "release prep"}
]
```"#;
        let completion = StaticCompletion::new(reply);
        let extractor = ThreadExtractor::new(Arc::new(completion.clone()), "UBOT", 5);

        let items = extractor.extract(&thread(), "general").await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].memory_type, MemoryType::Decision);
        assert_eq!(items[0].tags, vec!["release"]);
        assert_eq!(items[1].context.as_deref(), Some("release prep"));

        let prompts = completion.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("decision, action, preference, fact, context"));
        assert!(prompts[0].contains("return []"));
        assert!(prompts[0].contains("#general"));
        assert!(!prompts[0].contains("I can help with that"));
    }

    #[tokio::test]
    async fn test_nothing_worth_remembering() {
        let extractor = ThreadExtractor::new(Arc::new(StaticCompletion::new("[]")), "UBOT", 5);
        assert!(extractor.extract(&thread(), "general").await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_reply_is_empty() {
        let extractor = ThreadExtractor::new(
            Arc::new(StaticCompletion::new("Sure! Here are the memories: decision - ship")),
            "UBOT",
            5,
        );
        assert!(extractor.extract(&thread(), "general").await.is_empty());
    }

    #[tokio::test]
    async fn test_failure_is_empty() {
        let extractor = ThreadExtractor::new(Arc::new(StaticCompletion::failing()), "UBOT", 5);
        assert!(extractor.extract(&thread(), "general").await.is_empty());
    }

    #[tokio::test]
    async fn test_bot_only_thread_skips_call() {
        let completion = StaticCompletion::new("[]");
        let extractor = ThreadExtractor::new(Arc::new(completion.clone()), "UBOT", 5);
        let messages = vec![ThreadMessage::new("UBOT", "hello")];
        assert!(extractor.extract(&messages, "general").await.is_empty());
        assert!(completion.prompts().is_empty());
    }

    #[test]
    fn test_invalid_items_are_dropped() {
        let raw = r#"[
            {"type": "decision"},
            {"content": "no type"},
            {"type": "opinion", "content": "unknown type"},
            {"type": "FACT", "content": "  Acme has 40 stores  ", "tags": ["acme", 3, ""]},
            "just a string",
            {"type": "preference", "content": "   "}
        ]"#;
        let items = parse_memories(raw);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].memory_type, MemoryType::Fact);
        assert_eq!(items[0].content, "Acme has 40 stores");
        assert_eq!(items[0].tags, vec!["acme"]);
    }

    #[test]
    fn test_non_array_json_is_empty() {
        assert!(parse_memories(r#"{"type": "fact", "content": "x"}"#).is_empty());
        assert!(parse_memories("").is_empty());
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fence("```\n[]\n```\n"), "[]");
        assert_eq!(strip_code_fence("  [] "), "[]");
    }
}

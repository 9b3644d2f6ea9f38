//! Conversational replies
//!
//! Messages that do not enter the approval queue are answered by the model,
//! with the knowledge documents, recent approved memories and the user's
//! conversation window as context.

use super::store::ConversationStore;
use super::types::{ConversationTurn, Role};
use crate::error::Result;
use crate::knowledge::{KnowledgeBase, KnowledgeSnapshot};
use crate::llm::{with_timeout, Completion};
use crate::records::{Memory, RecordStore};
use std::sync::Arc;

/// Approved memories included in every prompt
const PROMPT_MEMORIES: usize = 20;

/// Answers conversational messages
pub struct Assistant {
    conversations: ConversationStore,
    records: RecordStore,
    knowledge: Arc<KnowledgeBase>,
    completion: Arc<dyn Completion>,
    max_tokens: u32,
    timeout_secs: u64,
}

impl Assistant {
    pub fn new(
        conversations: ConversationStore,
        records: RecordStore,
        knowledge: Arc<KnowledgeBase>,
        completion: Arc<dyn Completion>,
        max_tokens: u32,
        timeout_secs: u64,
    ) -> Self {
        Self {
            conversations,
            records,
            knowledge,
            completion,
            max_tokens,
            timeout_secs,
        }
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    /// Answer `text` from `user_id` and remember the exchange
    pub async fn reply(&self, user_id: &str, text: &str) -> Result<String> {
        let history = self.conversations.read(user_id).await?;
        let memories = self.records.list_memories(PROMPT_MEMORIES).await?;
        let snapshot = self.knowledge.snapshot().await;

        let prompt = build_reply_prompt(&snapshot, &memories, &history, text);
        let answer = with_timeout(
            self.timeout_secs,
            self.completion.complete(&prompt, self.max_tokens),
        )
        .await?;
        let answer = answer.trim().to_string();

        self.conversations.append(user_id, Role::User, text).await?;
        self.conversations
            .append(user_id, Role::Assistant, &answer)
            .await?;

        tracing::debug!(
            user = %user_id,
            history = history.len(),
            knowledge_version = snapshot.version,
            "Answered conversational message"
        );
        Ok(answer)
    }
}

/// Assemble the prompt for a conversational reply
pub fn build_reply_prompt(
    knowledge: &KnowledgeSnapshot,
    memories: &[Memory],
    history: &[ConversationTurn],
    message: &str,
) -> String {
    let mut prompt = String::from(
        "You are the team's knowledge assistant. Answer from the knowledge below. \
         If the answer is not there, say so. To record new information, the user \
         just states it and it goes to a reviewer.\n",
    );

    if !knowledge.documents.is_empty() {
        prompt.push_str("\n## Knowledge\n");
        for (name, text) in &knowledge.documents {
            prompt.push_str(&format!("\n<document name=\"{}\">\n{}\n</document>\n", name, text.trim()));
        }
    }

    if !memories.is_empty() {
        prompt.push_str("\n## Team memories\n");
        for memory in memories {
            prompt.push_str(&format!("- [{}] {}\n", memory.memory_type, memory.content));
        }
    }

    if !history.is_empty() {
        prompt.push_str("\n## Conversation so far\n");
        for turn in history {
            let speaker = match turn.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            prompt.push_str(&format!("{}: {}\n", speaker, turn.content));
        }
    }

    prompt.push_str(&format!("\nUser: {}\nAssistant:", message.trim()));
    prompt
}

//! Test doubles shared by unit tests

use crate::channels::{ChannelAdapter, ChannelEvent, FormRequest, OutboundMessage};
use crate::error::{Error, Result};
use crate::llm::Completion;
use crate::records::ThreadMessage;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Completion that returns a fixed reply (or fails) and records prompts
#[derive(Clone)]
pub struct StaticCompletion {
    reply: Option<String>,
    delay: Option<Duration>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl StaticCompletion {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            delay: None,
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            delay: None,
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_delay_ms(mut self, ms: u64) -> Self {
        self.delay = Some(Duration::from_millis(ms));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Completion for StaticCompletion {
    async fn complete(&self, prompt: &str, _max_tokens: u32) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply
            .clone()
            .ok_or_else(|| Error::Llm("scripted failure".to_string()))
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Channel that records everything sent through it
#[derive(Clone, Default)]
pub struct RecordingChannel {
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
    forms: Arc<Mutex<Vec<(String, FormRequest)>>>,
    threads: Arc<Mutex<HashMap<String, Vec<ThreadMessage>>>>,
    labels: Arc<Mutex<HashMap<String, String>>>,
    threads_unreadable: bool,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `messages` for `fetch_thread(_, thread_ref)`
    pub fn with_thread(self, thread_ref: &str, messages: Vec<ThreadMessage>) -> Self {
        self.threads
            .lock()
            .unwrap()
            .insert(thread_ref.to_string(), messages);
        self
    }

    /// Resolve `chat_id` to `label`
    pub fn with_label(self, chat_id: &str, label: &str) -> Self {
        self.labels
            .lock()
            .unwrap()
            .insert(chat_id.to_string(), label.to_string());
        self
    }

    /// Fail every `fetch_thread`
    pub fn with_unreadable_threads(mut self) -> Self {
        self.threads_unreadable = true;
        self
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Messages sent to one chat
    pub fn sent_to(&self, chat_id: &str) -> Vec<OutboundMessage> {
        self.sent()
            .into_iter()
            .filter(|m| m.chat_id == chat_id)
            .collect()
    }

    pub fn forms(&self) -> Vec<(String, FormRequest)> {
        self.forms.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelAdapter for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn start(&self, _event_tx: mpsc::Sender<ChannelEvent>) -> Result<()> {
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }

    async fn send_message(&self, message: OutboundMessage) -> Result<String> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(message);
        Ok(format!("msg-{}", sent.len()))
    }

    async fn open_form(
        &self,
        actor_id: &str,
        _trigger_ref: Option<&str>,
        form: FormRequest,
    ) -> Result<()> {
        self.forms
            .lock()
            .unwrap()
            .push((actor_id.to_string(), form));
        Ok(())
    }

    async fn fetch_thread(&self, _chat_id: &str, thread_ref: &str) -> Result<Vec<ThreadMessage>> {
        if self.threads_unreadable {
            return Err(Error::Channel("conversations.replies failed".to_string()));
        }
        Ok(self
            .threads
            .lock()
            .unwrap()
            .get(thread_ref)
            .cloned()
            .unwrap_or_default())
    }

    async fn channel_label(&self, chat_id: &str) -> Option<String> {
        self.labels.lock().unwrap().get(chat_id).cloned()
    }

    fn is_connected(&self) -> bool {
        true
    }
}

/// Gateway over an in-memory database and a temporary knowledge directory
/// holding `customers.md`
pub async fn test_gateway(
    completion: StaticCompletion,
    channel: RecordingChannel,
) -> (crate::gateway::Gateway, tempfile::TempDir) {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("customers.md"),
        "# Customers\n\n## OEM Partners\n\n- Globex: evaluating\n",
    )
    .unwrap();

    let mut config = crate::config::KnowClawConfig::default();
    config.approval.reviewer_id = "U_REVIEWER".to_string();
    config.gateway.sweep_interval_secs = 0;
    config.knowledge.dir = dir.path().to_path_buf();

    let gateway = crate::gateway::GatewayBuilder::new()
        .config(config)
        .database(crate::storage::Database::open_in_memory().unwrap())
        .documents(Arc::new(crate::knowledge::FsDocumentStore::new(dir.path())))
        .completion(Arc::new(completion))
        .channel(Arc::new(channel))
        .build()
        .await
        .unwrap();
    (gateway, dir)
}

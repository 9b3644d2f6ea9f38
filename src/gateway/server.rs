//! Gateway server implementation

use crate::approval::{ActionOutcome, ApprovalOrchestrator, MessageOutcome};
use crate::channels::{ChannelAdapter, ChannelEvent, InboundMessage, OutboundMessage, SlackAdapter};
use crate::config::KnowClawConfig;
use crate::conversation::{Assistant, ConversationStore};
use crate::error::{Error, Result};
use crate::knowledge::{DocumentStore, FsDocumentStore, KnowledgeBase};
use crate::llm::Completion;
use crate::records::RecordStore;
use crate::storage::Database;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;

/// Reply sent when the model cannot answer a conversational message
const REPLY_FAILED: &str = "Sorry, I couldn't answer that right now. Please try again shortly.";

/// Gateway server state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayState {
    /// Not started
    Stopped,
    /// Starting up
    Starting,
    /// Running
    Running,
    /// Shutting down
    ShuttingDown,
}

/// Routes channel events to the approval pipeline or the assistant
#[derive(Clone)]
pub struct Dispatcher {
    orchestrator: Arc<ApprovalOrchestrator>,
    assistant: Arc<Assistant>,
    channel: Arc<dyn ChannelAdapter>,
}

impl Dispatcher {
    pub fn new(
        orchestrator: Arc<ApprovalOrchestrator>,
        assistant: Arc<Assistant>,
        channel: Arc<dyn ChannelAdapter>,
    ) -> Self {
        Self {
            orchestrator,
            assistant,
            channel,
        }
    }

    /// Handle a single channel event
    pub async fn handle_event(&self, event: ChannelEvent) -> Result<()> {
        match event {
            ChannelEvent::Message(message) => {
                tracing::debug!(
                    "Received {:?} from {} on {}",
                    message.kind,
                    message.author_id,
                    message.channel
                );
                match self.orchestrator.handle_message(&message).await? {
                    MessageOutcome::NotRouted => self.converse(&message).await?,
                    outcome => tracing::debug!("Message routed: {}", outcome_label(&outcome)),
                }
            }
            ChannelEvent::Action(action) => {
                let outcome = self.orchestrator.handle_action(&action).await?;
                log_action(&action.action_id, &outcome);
            }
            ChannelEvent::FormSubmitted(form) => {
                let outcome = self.orchestrator.handle_form_submission(&form).await?;
                log_action(&form.callback_id, &outcome);
            }
            ChannelEvent::Connected { channel } => {
                tracing::info!("Channel {} connected", channel);
            }
            ChannelEvent::Disconnected { channel, reason } => {
                tracing::warn!("Channel {} disconnected: {}", channel, reason);
            }
        }
        Ok(())
    }

    /// Answer a message that did not enter the approval queue
    async fn converse(&self, message: &InboundMessage) -> Result<()> {
        let text = match self.assistant.reply(&message.author_id, &message.text).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(user = %message.author_id, "Reply generation failed: {}", e);
                REPLY_FAILED.to_string()
            }
        };
        let outbound =
            OutboundMessage::new(&message.chat_id, text).in_thread(message.reply_thread());
        self.channel.send_message(outbound).await?;
        Ok(())
    }
}

fn outcome_label(outcome: &MessageOutcome) -> String {
    match outcome {
        MessageOutcome::UpdateQueued(u) => format!("update {} queued", u.id),
        MessageOutcome::CorrectionQueued(u) => format!("correction {} queued", u.id),
        MessageOutcome::MemoryQueued(c) => format!("memory candidate {} queued", c.id),
        MessageOutcome::NothingExtracted => "nothing extracted".to_string(),
        MessageOutcome::ThreadUnavailable => "thread unavailable".to_string(),
        MessageOutcome::NotRouted => "not routed".to_string(),
    }
}

fn log_action(action_id: &str, outcome: &ActionOutcome) {
    match outcome {
        ActionOutcome::UpdateApproved { filing, .. }
        | ActionOutcome::MemoriesApproved { filing, .. }
            if filing.needs_follow_up() =>
        {
            tracing::warn!("Action {} approved but needs manual follow-up", action_id);
        }
        ActionOutcome::AlreadyProcessed { record_id } => {
            tracing::info!("Action {} ignored: {} already processed", action_id, record_id);
        }
        ActionOutcome::Ignored => {
            tracing::debug!("Unrecognised action {}", action_id);
        }
        _ => tracing::info!("Action {} handled", action_id),
    }
}

/// KnowClaw gateway
pub struct Gateway {
    config: KnowClawConfig,
    state: RwLock<GatewayState>,
    records: RecordStore,
    knowledge: Arc<KnowledgeBase>,
    assistant: Arc<Assistant>,
    dispatcher: Dispatcher,
    channel: Arc<dyn ChannelAdapter>,
    slack: Option<Arc<SlackAdapter>>,
    event_tx: mpsc::Sender<ChannelEvent>,
    event_rx: Mutex<Option<mpsc::Receiver<ChannelEvent>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Gateway {
    /// Get current state
    pub async fn state(&self) -> GatewayState {
        *self.state.read().await
    }

    /// Start the channel, the event processor and the conversation sweep
    pub async fn start(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if *state != GatewayState::Stopped {
            return Err(Error::Gateway("Gateway already running".to_string()));
        }
        *state = GatewayState::Starting;
        drop(state);

        tracing::info!("Starting KnowClaw Gateway");

        self.channel.start(self.event_tx.clone()).await?;

        let mut tasks = self.tasks.lock().await;
        if let Some(processor) = self.start_event_processor().await {
            tasks.push(processor);
        }
        if self.config.gateway.sweep_interval_secs > 0 {
            tasks.push(self.start_sweep(self.config.gateway.sweep_interval_secs));
        }
        drop(tasks);

        *self.state.write().await = GatewayState::Running;

        tracing::info!(
            "KnowClaw Gateway started with channel {}",
            self.channel.name()
        );

        Ok(())
    }

    /// Stop the gateway
    pub async fn stop(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if *state != GatewayState::Running {
            return Ok(());
        }
        *state = GatewayState::ShuttingDown;
        drop(state);

        tracing::info!("Stopping KnowClaw Gateway");

        if let Err(e) = self.channel.stop().await {
            tracing::warn!("Failed to stop channel {}: {}", self.channel.name(), e);
        }
        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }

        *self.state.write().await = GatewayState::Stopped;

        tracing::info!("KnowClaw Gateway stopped");

        Ok(())
    }

    /// Each event is handled on its own task so a slow model call never
    /// blocks button presses.
    async fn start_event_processor(&self) -> Option<JoinHandle<()>> {
        let mut rx = self.event_rx.lock().await.take()?;
        let dispatcher = self.dispatcher.clone();

        Some(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move {
                    if let Err(e) = dispatcher.handle_event(event).await {
                        tracing::error!("Error handling event: {}", e);
                    }
                });
            }
        }))
    }

    fn start_sweep(&self, interval_secs: u64) -> JoinHandle<()> {
        let assistant = self.assistant.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
            loop {
                ticker.tick().await;
                match assistant.conversations().purge_expired().await {
                    Ok(0) => {}
                    Ok(purged) => tracing::debug!(purged, "Swept expired conversation turns"),
                    Err(e) => tracing::warn!("Conversation sweep failed: {}", e),
                }
            }
        })
    }

    /// Serve the HTTP API until Ctrl+C
    pub async fn serve(self: Arc<Self>) -> Result<()> {
        let addr = format!("{}:{}", self.config.gateway.host, self.config.gateway.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!("KnowClaw API listening on {}", addr);

        let router = super::handler::router(self.clone());
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await?;

        tracing::info!("Shutting down...");
        self.stop().await
    }

    /// Get configuration
    pub fn config(&self) -> &KnowClawConfig {
        &self.config
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    pub fn knowledge(&self) -> &Arc<KnowledgeBase> {
        &self.knowledge
    }

    /// Slack adapter, when Slack is the configured channel
    pub fn slack(&self) -> Option<&Arc<SlackAdapter>> {
        self.slack.as_ref()
    }

    /// Get event sender for injecting webhook events
    pub fn event_sender(&self) -> &mpsc::Sender<ChannelEvent> {
        &self.event_tx
    }

    /// Get the event dispatcher
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Get gateway status information
    pub async fn status(&self) -> GatewayStatus {
        GatewayStatus {
            state: self.state().await,
            channel: self.channel.name().to_string(),
            channel_connected: self.channel.is_connected(),
            knowledge_version: self.knowledge.snapshot().await.version,
        }
    }
}

/// Gateway status information
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayStatus {
    pub state: GatewayState,
    pub channel: String,
    pub channel_connected: bool,
    pub knowledge_version: u64,
}

/// Builder for Gateway
///
/// Anything not supplied is built from the configuration: the SQLite
/// database, the knowledge directory, the model chain and the Slack adapter.
pub struct GatewayBuilder {
    config: KnowClawConfig,
    database: Option<Database>,
    documents: Option<Arc<dyn DocumentStore>>,
    completion: Option<Arc<dyn Completion>>,
    channel: Option<Arc<dyn ChannelAdapter>>,
    slack: Option<Arc<SlackAdapter>>,
}

impl GatewayBuilder {
    /// Create a new builder with default config
    pub fn new() -> Self {
        Self {
            config: KnowClawConfig::default(),
            database: None,
            documents: None,
            completion: None,
            channel: None,
            slack: None,
        }
    }

    /// Set the configuration
    pub fn config(mut self, config: KnowClawConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the gateway host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.gateway.host = host.into();
        self
    }

    /// Set the gateway port
    pub fn port(mut self, port: u16) -> Self {
        self.config.gateway.port = port;
        self
    }

    pub fn database(mut self, database: Database) -> Self {
        self.database = Some(database);
        self
    }

    pub fn documents(mut self, documents: Arc<dyn DocumentStore>) -> Self {
        self.documents = Some(documents);
        self
    }

    pub fn completion(mut self, completion: Arc<dyn Completion>) -> Self {
        self.completion = Some(completion);
        self
    }

    /// Use a channel other than Slack
    pub fn channel(mut self, channel: Arc<dyn ChannelAdapter>) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Use an already constructed Slack adapter
    pub fn slack(mut self, slack: SlackAdapter) -> Self {
        self.slack = Some(Arc::new(slack));
        self
    }

    /// Build the gateway
    pub async fn build(self) -> Result<Gateway> {
        let config = self.config;

        let database = match self.database {
            Some(db) => db,
            None => Database::open(config.storage.database_path())?,
        };
        let records = RecordStore::new(database.clone());
        let conversations = ConversationStore::new(database, &config.conversation);

        let documents = self
            .documents
            .unwrap_or_else(|| Arc::new(FsDocumentStore::new(config.knowledge.dir.clone())));
        let knowledge = Arc::new(KnowledgeBase::load(documents).await?);

        let completion = match self.completion {
            Some(completion) => completion,
            None => crate::llm::from_config(&config.models)?,
        };

        let (channel, slack) = match (self.channel, self.slack, &config.slack) {
            (Some(channel), _, _) => (channel, None),
            (None, Some(slack), _) => (slack.clone() as Arc<dyn ChannelAdapter>, Some(slack)),
            (None, None, Some(slack_config)) => {
                let slack = Arc::new(SlackAdapter::from_env(slack_config.clone())?);
                (slack.clone() as Arc<dyn ChannelAdapter>, Some(slack))
            }
            (None, None, None) => {
                return Err(Error::Config(
                    "no channel configured: add a [slack] section".to_string(),
                ))
            }
        };

        let orchestrator = Arc::new(ApprovalOrchestrator::from_config(
            &config,
            records.clone(),
            knowledge.clone(),
            completion.clone(),
            channel.clone(),
        )?);
        let assistant = Arc::new(Assistant::new(
            conversations,
            records.clone(),
            knowledge.clone(),
            completion,
            config.models.max_tokens,
            config.models.timeout_secs,
        ));

        let (event_tx, event_rx) = mpsc::channel(config.gateway.event_buffer.max(1));

        Ok(Gateway {
            dispatcher: Dispatcher::new(orchestrator, assistant.clone(), channel.clone()),
            config,
            state: RwLock::new(GatewayState::Stopped),
            records,
            knowledge,
            assistant,
            channel,
            slack,
            event_tx,
            event_rx: Mutex::new(Some(event_rx)),
            tasks: Mutex::new(Vec::new()),
        })
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

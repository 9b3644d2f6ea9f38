//! Channel adapter trait and shared adapter state

use super::message::{ActionEvent, FormRequest, FormSubmission, InboundMessage, OutboundMessage};
use crate::error::Result;
use crate::records::ThreadMessage;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::mpsc;

/// Events delivered by channel adapters to the gateway
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// Chat message addressed to the assistant
    Message(InboundMessage),
    /// Interactive control pressed
    Action(ActionEvent),
    /// Edit form submitted
    FormSubmitted(FormSubmission),
    /// Adapter connected
    Connected { channel: String },
    /// Adapter disconnected
    Disconnected { channel: String, reason: String },
}

/// Lifecycle state of an adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AdapterStatus {
    Stopped = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
}

/// Name and status shared by adapter implementations
pub struct AdapterBase {
    name: String,
    status: AtomicU8,
}

impl AdapterBase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: AtomicU8::new(AdapterStatus::Stopped as u8),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> AdapterStatus {
        match self.status.load(Ordering::SeqCst) {
            1 => AdapterStatus::Starting,
            2 => AdapterStatus::Running,
            3 => AdapterStatus::Stopping,
            _ => AdapterStatus::Stopped,
        }
    }

    pub fn set_status(&self, status: AdapterStatus) {
        self.status.store(status as u8, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.status() == AdapterStatus::Running
    }
}

/// Chat platform transport
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Adapter name (e.g. "slack")
    fn name(&self) -> &str;

    /// Start delivering events into `event_tx`
    async fn start(&self, event_tx: mpsc::Sender<ChannelEvent>) -> Result<()>;

    /// Stop the adapter
    async fn stop(&self) -> Result<()>;

    /// Post a message, returning the platform message ID
    async fn send_message(&self, message: OutboundMessage) -> Result<String>;

    /// Present a form to `actor_id`. The submission arrives later as
    /// `ChannelEvent::FormSubmitted`.
    async fn open_form(
        &self,
        actor_id: &str,
        trigger_ref: Option<&str>,
        form: FormRequest,
    ) -> Result<()>;

    /// Every message of a thread, oldest first
    async fn fetch_thread(&self, chat_id: &str, thread_ref: &str) -> Result<Vec<ThreadMessage>>;

    /// Human-readable name of a chat, when the platform can resolve one
    async fn channel_label(&self, _chat_id: &str) -> Option<String> {
        None
    }

    /// Whether the adapter is running
    fn is_connected(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_base_status() {
        let base = AdapterBase::new("slack");
        assert_eq!(base.name(), "slack");
        assert_eq!(base.status(), AdapterStatus::Stopped);
        assert!(!base.is_running());

        base.set_status(AdapterStatus::Running);
        assert!(base.is_running());
    }
}

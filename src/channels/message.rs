//! Channel-neutral message types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How an inbound message reached the assistant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// The assistant was @-mentioned in a channel
    Mention,
    /// Direct message to the assistant
    DirectMessage,
    /// Reply inside a thread the assistant is part of
    ThreadReply,
}

/// Inbound chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    /// Channel adapter name (e.g. "slack")
    pub channel: String,
    pub kind: MessageKind,
    /// Author's user ID
    pub author_id: String,
    /// Message text with the assistant's mention removed
    pub text: String,
    /// Conversation the message was posted in
    pub chat_id: String,
    /// Human-readable conversation name, when known
    #[serde(default)]
    pub chat_label: Option<String>,
    /// Root of the thread this message belongs to
    #[serde(default)]
    pub thread_ref: Option<String>,
    /// Platform ID of this message
    #[serde(default)]
    pub message_ref: Option<String>,
}

impl InboundMessage {
    /// Thread to reply into: the message's thread, or the message itself
    pub fn reply_thread(&self) -> Option<String> {
        self.thread_ref.clone().or_else(|| self.message_ref.clone())
    }
}

/// Button press on an interactive control
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionEvent {
    pub channel: String,
    /// Encoded action ID (`approve_update_<id>`)
    pub action_id: String,
    pub actor_id: String,
    /// Conversation the control was rendered in
    #[serde(default)]
    pub chat_id: Option<String>,
    /// Short-lived handle required to open a form in response
    #[serde(default)]
    pub trigger_ref: Option<String>,
}

/// Submitted edit form
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSubmission {
    pub channel: String,
    /// Encoded action ID the form was opened for
    pub callback_id: String,
    pub actor_id: String,
    /// Field name to submitted value
    pub fields: HashMap<String, String>,
}

/// Visual weight of an action button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Danger,
}

/// Interactive button attached to an outbound message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageAction {
    pub action_id: String,
    pub label: String,
    #[serde(default)]
    pub style: Option<ButtonStyle>,
}

/// Outbound chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage {
    /// Conversation or user ID to post to
    pub chat_id: String,
    pub content: String,
    /// Thread to reply into
    #[serde(default)]
    pub thread_ref: Option<String>,
    #[serde(default)]
    pub actions: Vec<MessageAction>,
}

impl OutboundMessage {
    pub fn new(chat_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            content: content.into(),
            thread_ref: None,
            actions: Vec::new(),
        }
    }

    pub fn in_thread(mut self, thread_ref: Option<String>) -> Self {
        self.thread_ref = thread_ref;
        self
    }

    pub fn with_actions(mut self, actions: Vec<MessageAction>) -> Self {
        self.actions = actions;
        self
    }
}

/// One input of an edit form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub name: String,
    pub label: String,
    /// Prefilled value
    pub value: String,
    pub multiline: bool,
}

/// Form to present to a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormRequest {
    /// Echoed back in the `FormSubmission`
    pub callback_id: String,
    pub title: String,
    pub fields: Vec<FormField>,
}

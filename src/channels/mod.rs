//! Chat channel adapters
//!
//! Provides a channel-neutral interface for receiving messages, button
//! presses and form submissions, and for posting replies back.

mod adapter;
mod message;
mod slack;

pub use adapter::{AdapterBase, AdapterStatus, ChannelAdapter, ChannelEvent};
pub use message::{
    ActionEvent, ButtonStyle, FormField, FormRequest, FormSubmission, InboundMessage,
    MessageAction, MessageKind, OutboundMessage,
};
pub use slack::{render_blocks, render_view, sign_request, SlackAdapter};

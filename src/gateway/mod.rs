//! Gateway server for KnowClaw
//!
//! Owns the channel adapter and the event loop that feeds the approval
//! pipeline, and serves the admin HTTP API and Slack webhooks.

mod handler;
mod server;

pub use handler::router;
pub use server::{Dispatcher, Gateway, GatewayBuilder, GatewayState, GatewayStatus};

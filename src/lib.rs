//! KnowClaw - Approval-gated knowledge assistant for team chat
//!
//! KnowClaw answers questions from a set of markdown knowledge documents
//! and lets the team change those documents by talking to it. No message
//! ever edits knowledge directly: every proposed change is recorded,
//! sent to a designated reviewer, and applied only once approved.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                          KnowClaw Gateway                          │
//! │   Slack webhooks ──► ChannelEvent queue ──► Dispatcher             │
//! │                                               │                    │
//! │             ┌─────────────────────────────────┴──────────┐         │
//! │             ▼                                            ▼         │
//! │   ┌──────────────────────┐                  ┌──────────────────┐   │
//! │   │ Approval Orchestrator│                  │    Assistant     │   │
//! │   │  - intent classifier │                  │  - conversation  │   │
//! │   │  - thread extractor  │                  │    window        │   │
//! │   │  - reviewer buttons  │                  │  - knowledge +   │   │
//! │   └─────────┬────────────┘                  │    memories      │   │
//! │             │ approve                       └──────────────────┘   │
//! │             ▼                                                      │
//! │   ┌──────────────────────┐     ┌───────────────────────────────┐   │
//! │   │  Document Patcher    │────►│ knowledge/*.md + sync command │   │
//! │   └──────────────────────┘     └───────────────────────────────┘   │
//! │                                                                    │
//! │   Record Store + Conversation Store (SQLite)                       │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Records
//!
//! - **Update**: one free-text knowledge edit, filed into a document section
//! - **MemoryCandidate**: a batch of items extracted from a chat thread,
//!   approved or rejected as a unit
//! - **Memory**: an approved item, immutable except for deletion
//!
//! Status changes are conditional on the record still being pending, so
//! concurrent clicks on the same button resolve to exactly one decision.

pub mod approval;
pub mod channels;
pub mod config;
pub mod conversation;
pub mod error;
pub mod extract;
pub mod gateway;
pub mod intent;
pub mod knowledge;
pub mod llm;
pub mod records;
pub mod storage;

#[cfg(test)]
mod testing;

pub use config::KnowClawConfig;
pub use error::{Error, Result};

//! Per-user conversation memory
//!
//! A rolling window of recent turns per user with idle expiry, plus the
//! prompt assembler used for conversational replies.

mod assistant;
mod store;
mod types;

pub use assistant::{build_reply_prompt, Assistant};
pub use store::ConversationStore;
pub use types::{ConversationTurn, Role};

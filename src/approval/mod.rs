//! Approval gate for knowledge mutations
//!
//! Records enter `pending`, a reviewer is notified with approve / edit /
//! reject controls, and exactly one decision moves the record to a terminal
//! state. Approved records are filed into the knowledge documents.

mod action;
mod orchestrator;
mod render;

pub use action::{ActionId, ActionVerb, RecordFamily};
pub use orchestrator::{
    ActionOutcome, ApprovalOrchestrator, Filing, MessageOutcome, SOURCE_ADMIN_CORRECTION,
    SOURCE_MESSAGE, SOURCE_THREAD,
};
pub use render::{
    candidate_edit_form, candidate_review_text, encode_memories, parse_memory_lines,
    review_actions, update_edit_form, update_review_text, FIELD_MEMORIES, FIELD_TARGET,
    FIELD_VALUE,
};

//! Knowledge documents
//!
//! Named, section-structured text documents, an owned versioned snapshot of
//! them, and the patcher that files approved records into them.

mod base;
mod patch;
mod patcher;
mod sanitizer;
mod store;

pub use base::{KnowledgeBase, KnowledgeSnapshot};
pub use patch::{
    apply_to_document, find_subsection, subsection_titles, update_last_updated, PatchOutcome,
};
pub use patcher::{format_memory_entry, format_update_entry, today, DocumentPatcher, PatchReport};
pub use sanitizer::ContentSanitizer;
pub use store::{DocumentStore, FsDocumentStore};

//! Durable record store
//!
//! Two record families go through the approval gate: Updates (single
//! free-text knowledge edits) and MemoryCandidates (batches of extracted
//! memory items). Approved candidates fan out into immutable Memories.

mod ids;
mod store;
mod types;

pub use ids::{generate_id, ID_LEN};
pub use store::RecordStore;
pub use types::{
    ExtractedMemory, Memory, MemoryCandidate, MemoryType, NewMemoryCandidate, NewUpdate,
    RecordStatus, ThreadMessage, Transition, Update, UpdateKind,
};

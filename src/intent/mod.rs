//! Intent classification
//!
//! Decides whether a message should enter the approval queue and, if so,
//! what kind of Update it is.

mod classifier;
mod target;

pub use classifier::{IntentClassifier, Prefilter};
pub use target::{TargetExtractor, UpdateTarget};

//! Typed interactive action IDs
//!
//! Buttons and forms carry `<verb>_<family>_<record id>`, for example
//! `approve_update_Xk3Lm9PqR2`. The string is decoded once, at the channel
//! boundary.

use serde::{Deserialize, Serialize};

/// What the reviewer asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionVerb {
    Approve,
    Edit,
    Reject,
}

impl ActionVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Edit => "edit",
            Self::Reject => "reject",
        }
    }
}

/// Which record family the action targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFamily {
    Update,
    Memory,
}

impl RecordFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Memory => "memory",
        }
    }
}

/// Decoded action ID
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionId {
    pub verb: ActionVerb,
    pub family: RecordFamily,
    pub record_id: String,
}

impl ActionId {
    pub fn new(verb: ActionVerb, family: RecordFamily, record_id: impl Into<String>) -> Self {
        Self {
            verb,
            family,
            record_id: record_id.into(),
        }
    }

    /// The same record with a different verb
    pub fn with_verb(&self, verb: ActionVerb) -> Self {
        Self {
            verb,
            ..self.clone()
        }
    }
}

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}_{}_{}",
            self.verb.as_str(),
            self.family.as_str(),
            self.record_id
        )
    }
}

impl std::str::FromStr for ActionId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '_');
        let verb = match parts.next() {
            Some("approve") => ActionVerb::Approve,
            Some("edit") => ActionVerb::Edit,
            Some("reject") => ActionVerb::Reject,
            _ => return Err(format!("unknown action verb in '{}'", s)),
        };
        let family = match parts.next() {
            Some("update") => RecordFamily::Update,
            Some("memory") => RecordFamily::Memory,
            _ => return Err(format!("unknown record family in '{}'", s)),
        };
        match parts.next() {
            Some(id) if !id.is_empty() => Ok(Self::new(verb, family, id)),
            _ => Err(format!("missing record id in '{}'", s)),
        }
    }
}

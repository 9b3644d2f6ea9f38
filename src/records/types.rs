//! Record types for the approval pipeline
//!
//! All wire types use camelCase JSON serialization, matching the admin API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Approval status shared by Updates and MemoryCandidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Pending,
    Approved,
    Rejected,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecordStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown record status: {}", other)),
        }
    }
}

/// Coarse classification of an Update, used to pick its target section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    Oem,
    Event,
    Contact,
    Priority,
    General,
}

impl UpdateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Oem => "oem",
            Self::Event => "event",
            Self::Contact => "contact",
            Self::Priority => "priority",
            Self::General => "general",
        }
    }
}

impl std::fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UpdateKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "oem" => Ok(Self::Oem),
            "event" => Ok(Self::Event),
            "contact" => Ok(Self::Contact),
            "priority" => Ok(Self::Priority),
            "general" => Ok(Self::General),
            other => Err(format!("unknown update kind: {}", other)),
        }
    }
}

/// Closed set of memory item types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    Decision,
    Action,
    Preference,
    Fact,
    Context,
}

impl MemoryType {
    pub const ALL: [MemoryType; 5] = [
        Self::Decision,
        Self::Action,
        Self::Preference,
        Self::Fact,
        Self::Context,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Decision => "decision",
            Self::Action => "action",
            Self::Preference => "preference",
            Self::Fact => "fact",
            Self::Context => "context",
        }
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "decision" => Ok(Self::Decision),
            "action" => Ok(Self::Action),
            "preference" => Ok(Self::Preference),
            "fact" => Ok(Self::Fact),
            "context" => Ok(Self::Context),
            other => Err(format!("unknown memory type: {}", other)),
        }
    }
}

/// A single free-text knowledge edit awaiting approval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Update {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: UpdateKind,
    pub target: String,
    pub value: String,
    pub submitted_by: String,
    pub submitted_at: DateTime<Utc>,
    pub status: RecordStatus,
    pub source: String,
    pub channel: Option<String>,
    pub thread_ref: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub processed_by: Option<String>,
    pub edited_at: Option<DateTime<Utc>>,
    pub edited_by: Option<String>,
    pub note: Option<String>,
}

/// Fields for creating an Update
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUpdate {
    #[serde(rename = "type")]
    pub kind: UpdateKind,
    pub target: String,
    pub value: String,
    pub submitted_by: String,
    pub source: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub thread_ref: Option<String>,
}

/// One message of a chat thread, as captured for extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadMessage {
    pub author_id: String,
    pub text: String,
    #[serde(default)]
    pub ts: Option<String>,
}

impl ThreadMessage {
    pub fn new(author_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author_id: author_id.into(),
            text: text.into(),
            ts: None,
        }
    }
}

/// A structured memory item proposed by extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedMemory {
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    pub content: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A batch of extracted memory items awaiting approval as a unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryCandidate {
    pub id: String,
    pub source: String,
    pub channel: String,
    pub channel_ref: String,
    pub thread_ref: String,
    pub raw_messages: Vec<ThreadMessage>,
    pub extracted_memories: Vec<ExtractedMemory>,
    pub submitted_by: String,
    pub submitted_at: DateTime<Utc>,
    pub status: RecordStatus,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// Fields for creating a MemoryCandidate
#[derive(Debug, Clone)]
pub struct NewMemoryCandidate {
    pub source: String,
    pub channel: String,
    pub channel_ref: String,
    pub thread_ref: String,
    pub raw_messages: Vec<ThreadMessage>,
    pub extracted_memories: Vec<ExtractedMemory>,
    pub submitted_by: String,
}

/// An approved, immutable memory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    pub id: String,
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    pub content: String,
    pub context: Option<String>,
    pub source: String,
    pub channel: String,
    pub thread_ref: Option<String>,
    pub submitted_by: String,
    pub approved_by: String,
    pub created_at: DateTime<Utc>,
    pub tags: Vec<String>,
}

/// Outcome of a conditional status change or edit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// This call moved the record
    Applied,
    /// The record was missing or no longer pending
    NoOp,
}

impl Transition {
    pub fn applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

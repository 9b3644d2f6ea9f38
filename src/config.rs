//! KnowClaw configuration management

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Main KnowClaw configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowClawConfig {
    /// Gateway configuration
    pub gateway: GatewayConfig,

    /// Slack channel configuration
    pub slack: Option<SlackConfig>,

    /// Conversation window configuration
    pub conversation: ConversationConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Knowledge document configuration
    pub knowledge: KnowledgeConfig,

    /// Intent classification configuration
    pub intent: IntentConfig,

    /// Approval routing configuration
    pub approval: ApprovalConfig,

    /// Model configuration
    pub models: ModelsConfig,
}

impl KnowClawConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Load a configuration file
    pub fn load(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Capacity of the inbound event queue
    pub event_buffer: usize,

    /// Interval between expired-conversation sweeps in seconds (0 = disabled)
    pub sweep_interval_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 18791,
            event_buffer: 1000,
            sweep_interval_secs: 300,
        }
    }
}

/// Slack channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Environment variable holding the bot token
    pub bot_token_ref: String,

    /// Environment variable holding the request signing secret
    pub signing_secret_ref: String,

    /// The assistant's own Slack user ID (its messages are ignored)
    pub bot_user_id: String,

    /// Allowed workspace IDs (empty = all allowed)
    #[serde(default)]
    pub allowed_workspaces: Vec<String>,
}

/// Conversation window configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Idle time after which a conversation expires, in seconds
    pub ttl_secs: u64,

    /// Maximum number of turns kept per user
    pub max_turns: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 30 * 60,
            max_turns: 20,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory for storage
    pub base_dir: PathBuf,

    /// SQLite database file name, relative to `base_dir`
    pub database: String,
}

impl StorageConfig {
    /// Full path of the SQLite database
    pub fn database_path(&self) -> PathBuf {
        self.base_dir.join(&self.database)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            database: "knowclaw.db".to_string(),
        }
    }
}

/// Where an approved entry is filed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRoute {
    /// Knowledge document name (file stem)
    pub document: String,

    /// Section heading the entry is inserted under
    pub section: String,
}

impl DocumentRoute {
    pub fn new(document: impl Into<String>, section: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            section: section.into(),
        }
    }
}

/// Knowledge document configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Directory holding the `<name>.md` documents
    pub dir: PathBuf,

    /// Prefix of the "last updated" line refreshed on every write
    pub last_updated_prefix: String,

    /// Update kind (`oem`, `event`, ...) to target section
    pub routes: BTreeMap<String, DocumentRoute>,

    /// Section approved memories are logged under
    pub memory_route: DocumentRoute,

    /// Misspelling corrections applied before insertion (from, to)
    pub corrections: Vec<(String, String)>,

    /// OEM vendor names recognised by the target extractor
    pub oem_names: Vec<String>,

    /// Event names recognised by the target extractor
    pub event_names: Vec<String>,

    /// Command run after each successful document write
    pub sync_command: Option<Vec<String>>,

    /// Timeout for the sync command in seconds
    pub sync_timeout_secs: u64,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        let mut routes = BTreeMap::new();
        routes.insert(
            "oem".to_string(),
            DocumentRoute::new("customers", "## OEM Partners"),
        );
        routes.insert(
            "contact".to_string(),
            DocumentRoute::new("customers", "## Contacts"),
        );
        routes.insert(
            "event".to_string(),
            DocumentRoute::new("priorities", "## Events"),
        );
        routes.insert(
            "priority".to_string(),
            DocumentRoute::new("priorities", "## Current Priorities"),
        );
        routes.insert(
            "general".to_string(),
            DocumentRoute::new("memory-log", "## Updates"),
        );

        Self {
            dir: default_base_dir().join("knowledge"),
            last_updated_prefix: "Last updated: ".to_string(),
            routes,
            memory_route: DocumentRoute::new("memory-log", "## Memories"),
            corrections: default_corrections(),
            oem_names: Vec::new(),
            event_names: vec![
                "CES".to_string(),
                "MWC".to_string(),
                "Computex".to_string(),
                "IFA".to_string(),
            ],
            sync_command: None,
            sync_timeout_secs: 30,
        }
    }
}

/// Known transcription errors in product names
pub fn default_corrections() -> Vec<(String, String)> {
    [
        ("know claw", "KnowClaw"),
        ("knowclaw", "KnowClaw"),
        ("sales force", "Salesforce"),
        ("hub spot", "HubSpot"),
        ("linked in", "LinkedIn"),
        ("git hub", "GitHub"),
    ]
    .into_iter()
    .map(|(from, to)| (from.to_string(), to.to_string()))
    .collect()
}

/// Stage of the intent pipeline a rule belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStage {
    /// Interrogative screen: a rejecting match means "this is a question"
    Query,
    /// Update gate: an accepting match lets the message reach confirmation
    Update,
    /// Admin-correction detector
    Correction,
}

/// What a matching rule decides within its stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Accept,
    Reject,
}

/// One row of the intent rule table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentRule {
    /// Rule name (for logs)
    pub name: String,
    /// Regular expression matched against the message text
    pub pattern: String,
    /// Decision when the pattern matches
    pub polarity: Polarity,
    /// Pipeline stage
    pub stage: RuleStage,
}

impl IntentRule {
    pub fn new(name: &str, pattern: &str, polarity: Polarity, stage: RuleStage) -> Self {
        Self {
            name: name.to_string(),
            pattern: pattern.to_string(),
            polarity,
            stage,
        }
    }
}

/// Default English rule table
pub fn default_intent_rules() -> Vec<IntentRule> {
    use Polarity::*;
    use RuleStage::*;

    vec![
        // Questions are never updates
        IntentRule::new(
            "question_word",
            r"(?i)^\s*(what|what's|who|who's|when|where|why|how|which|whose|whom)\b",
            Reject,
            Query,
        ),
        IntentRule::new(
            "auxiliary_question",
            r"(?i)^\s*(is|are|was|were|do|does|did|can|could|should|would|will|has|have)\b[^.!]*\?\s*$",
            Reject,
            Query,
        ),
        IntentRule::new(
            "lookup_request",
            r"(?i)\b(tell me|show me|remind me|look up|any updates on|status of)\b",
            Reject,
            Query,
        ),
        IntentRule::new("trailing_question_mark", r"\?\s*$", Reject, Query),
        // Recording verbs and status changes
        IntentRule::new(
            "record_verb",
            r"(?i)\b(remember|note that|record|log|add|update|put down|fyi)\b",
            Accept,
            Update,
        ),
        IntentRule::new(
            "status_change",
            r"(?i)\b(confirmed|signed|closed|cancel+ed|booked|scheduled|moved|postponed|launched|shipped|completed|finished|approved|declined|agreed|renewed|churned)\b",
            Accept,
            Update,
        ),
        IntentRule::new(
            "state_phrase",
            r"(?i)\b(is now|are now|has been|have been|will be|going forward)\b",
            Accept,
            Update,
        ),
        IntentRule::new(
            "contact_verb",
            r"(?i)\b(met with|spoke with|spoke to|talked to|called|emailed|meeting with|intro(duced)? to)\b",
            Accept,
            Update,
        ),
        IntentRule::new("deadline", r"(?i)\b(deadline|due (on|by))\b", Accept, Update),
        // Corrective language from administrators
        IntentRule::new("actually", r"(?i)\bactually\b", Accept, Correction),
        IntentRule::new("should_be", r"(?i)\bshould (be|say|read)\b", Accept, Correction),
        IntentRule::new("correction", r"(?i)\bcorrection\b", Accept, Correction),
        IntentRule::new(
            "thats_wrong",
            r"(?i)\b(that's|that is|this is) (wrong|incorrect|outdated|not right)\b",
            Accept,
            Correction,
        ),
        IntentRule::new("its_not", r"(?i)\bit'?s not\b", Accept, Correction),
        IntentRule::new(
            "change_to",
            r"(?i)\b(change|update|fix) .+ to\b",
            Accept,
            Correction,
        ),
    ]
}

/// Intent classification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentConfig {
    /// Rule table, evaluated in order within each stage
    pub rules: Vec<IntentRule>,

    /// Timeout for the confirming capability call in seconds
    pub confirm_timeout_secs: u64,

    /// Verdict when the confirming call fails; `true` routes to review
    pub fallback_on_error: bool,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            rules: default_intent_rules(),
            confirm_timeout_secs: 10,
            fallback_on_error: true,
        }
    }
}

/// Approval routing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalConfig {
    /// Chat user (or channel) that receives review requests
    pub reviewer_id: String,

    /// Users whose corrective messages are routed to review
    pub admin_ids: Vec<String>,

    /// Mention phrases that request thread memory extraction
    pub thread_triggers: Vec<String>,

    /// Timeout for the thread extraction call in seconds
    pub extract_timeout_secs: u64,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            reviewer_id: String::new(),
            admin_ids: Vec::new(),
            thread_triggers: vec![
                "remember this thread".to_string(),
                "remember this".to_string(),
                "save this thread".to_string(),
            ],
            extract_timeout_secs: 60,
        }
    }
}

/// Model provider API flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Anthropic,
    Openai,
}

/// Model provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelProviderConfig {
    /// Provider name (for logs)
    pub name: String,

    /// API flavour
    pub kind: ProviderKind,

    /// Environment variable holding the API key
    pub api_key_ref: String,

    /// Custom base URL
    #[serde(default)]
    pub base_url: Option<String>,

    /// Model ID
    pub model: String,
}

/// Model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Providers in fallback order
    pub providers: Vec<ModelProviderConfig>,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Token budget for conversational replies
    pub max_tokens: u32,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            providers: vec![
                ModelProviderConfig {
                    name: "anthropic".to_string(),
                    kind: ProviderKind::Anthropic,
                    api_key_ref: "anthropic_api_key".to_string(),
                    base_url: None,
                    model: "claude-sonnet-4-20250514".to_string(),
                },
                ModelProviderConfig {
                    name: "openai".to_string(),
                    kind: ProviderKind::Openai,
                    api_key_ref: "openai_api_key".to_string(),
                    base_url: None,
                    model: "gpt-4o-mini".to_string(),
                },
            ],
            timeout_secs: 30,
            max_tokens: 1024,
        }
    }
}

/// Resolve API keys from environment variables.
///
/// For each provider, the `api_key_ref` field names an environment variable
/// (e.g. `"anthropic_api_key"` → reads `$ANTHROPIC_API_KEY`).  We try both
/// the original casing and the UPPER_CASE form.
pub fn resolve_api_keys_from_env(models: &ModelsConfig) -> HashMap<String, String> {
    let mut keys = HashMap::new();
    for cfg in &models.providers {
        if let Some(key) = resolve_secret(&cfg.api_key_ref) {
            keys.insert(cfg.name.clone(), key);
        }
    }
    keys
}

/// Read a secret from the environment by reference, trying the exact
/// name and then its UPPER_CASE form.
pub fn resolve_secret(reference: &str) -> Option<String> {
    std::env::var(reference)
        .or_else(|_| std::env::var(reference.to_uppercase()))
        .ok()
        .filter(|v| !v.is_empty())
}

/// Default base directory (~/.knowclaw)
pub fn default_base_dir() -> PathBuf {
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".knowclaw")
}

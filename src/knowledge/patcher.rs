//! Filing approved records into knowledge documents
//!
//! One filing is: read the document, sanitize the entry, insert it into the
//! routed section, refresh the "last updated" marker, write the whole text
//! back in one call, publish the new snapshot, then run the optional sync
//! command.

use super::base::KnowledgeBase;
use super::patch::{apply_to_document, find_subsection, update_last_updated};
use super::sanitizer::ContentSanitizer;
use crate::config::{DocumentRoute, KnowledgeConfig};
use crate::error::{Error, Result};
use crate::llm::truncate;
use crate::records::{Memory, Update, UpdateKind};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// What happened when an entry was filed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchReport {
    /// Document written
    pub document: String,
    /// Heading the entry went under
    pub section: String,
    /// `false` when the section was missing and the entry was appended at
    /// the end of the document
    pub section_found: bool,
    /// Failure of the post-write sync command; the write itself is durable
    pub sync_error: Option<String>,
}

impl PatchReport {
    /// Whether the filing needs a human to follow up
    pub fn needs_follow_up(&self) -> bool {
        !self.section_found || self.sync_error.is_some()
    }
}

/// Files approved Updates and Memories into knowledge documents
pub struct DocumentPatcher {
    knowledge: Arc<KnowledgeBase>,
    sanitizer: ContentSanitizer,
    routes: BTreeMap<String, DocumentRoute>,
    memory_route: DocumentRoute,
    last_updated_prefix: String,
    sync_command: Option<Vec<String>>,
    sync_timeout_secs: u64,
    sync_dir: PathBuf,
}

impl DocumentPatcher {
    pub fn new(knowledge: Arc<KnowledgeBase>, config: &KnowledgeConfig) -> Result<Self> {
        Ok(Self {
            knowledge,
            sanitizer: ContentSanitizer::new(&config.corrections)?,
            routes: config.routes.clone(),
            memory_route: config.memory_route.clone(),
            last_updated_prefix: config.last_updated_prefix.clone(),
            sync_command: config.sync_command.clone().filter(|c| !c.is_empty()),
            sync_timeout_secs: config.sync_timeout_secs,
            sync_dir: config.dir.clone(),
        })
    }

    /// Route for an update kind, falling back to the `general` route
    pub fn route_for(&self, kind: UpdateKind) -> Option<&DocumentRoute> {
        self.routes
            .get(kind.as_str())
            .or_else(|| self.routes.get(UpdateKind::General.as_str()))
    }

    /// File an approved Update under its kind's section.
    ///
    /// When the section has a sub-heading named after the update's target
    /// (`### Acme`), the entry goes under that sub-heading instead.
    pub async fn file_update(&self, update: &Update) -> Result<PatchReport> {
        let route = self.route_for(update.kind).ok_or_else(|| {
            Error::Knowledge(format!("no document route for update kind {}", update.kind))
        })?;
        let date = today();
        let entry = format_update_entry(update, &date);
        self.file(route, Some(&update.target), &entry, &date).await
    }

    /// File approved Memories as one block in the memory log
    pub async fn file_memories(&self, memories: &[Memory]) -> Result<PatchReport> {
        let date = today();
        let entry = memories
            .iter()
            .map(|m| format_memory_entry(m, &date))
            .collect::<Vec<_>>()
            .join("\n");
        self.file(&self.memory_route, None, &entry, &date).await
    }

    async fn file(
        &self,
        route: &DocumentRoute,
        target: Option<&str>,
        entry: &str,
        date: &str,
    ) -> Result<PatchReport> {
        let store = self.knowledge.store();
        let current = store.read(&route.document).await?.unwrap_or_default();

        let section = target
            .and_then(|t| find_subsection(&current, &route.section, t))
            .unwrap_or_else(|| route.section.clone());

        let entry = self.sanitizer.apply(entry);
        let outcome = apply_to_document(&current, &section, &entry);
        let text = update_last_updated(&outcome.text, &self.last_updated_prefix, date)
            .unwrap_or(outcome.text);

        store.write(&route.document, &text).await?;
        self.knowledge
            .refresh_document(&route.document, text)
            .await;

        tracing::info!(
            document = %route.document,
            section = %section,
            section_found = outcome.section_found,
            "Filed knowledge entry"
        );

        let sync_error = match self.run_sync().await {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!("Knowledge sync failed after writing {}: {}", route.document, e);
                Some(e.to_string())
            }
        };

        Ok(PatchReport {
            document: route.document.clone(),
            section,
            section_found: outcome.section_found,
            sync_error,
        })
    }

    async fn run_sync(&self) -> Result<()> {
        let Some(command) = &self.sync_command else {
            return Ok(());
        };

        let mut cmd = tokio::process::Command::new(&command[0]);
        cmd.args(&command[1..]).kill_on_drop(true);
        if self.sync_dir.is_dir() {
            cmd.current_dir(&self.sync_dir);
        }

        let output = tokio::time::timeout(
            Duration::from_secs(self.sync_timeout_secs),
            cmd.output(),
        )
        .await
        .map_err(|_| Error::Timeout(self.sync_timeout_secs))??;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(Error::Knowledge(format!(
                "sync command exited with {}: {}",
                output.status,
                truncate(stderr.trim(), 200)
            )))
        }
    }
}

/// `YYYY-MM-DD` in UTC
pub fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

/// Markdown bullet for an approved Update
pub fn format_update_entry(update: &Update, date: &str) -> String {
    format!(
        "- **{}**: {} _(added {})_",
        update.target.trim(),
        update.value.trim(),
        date
    )
}

/// Markdown bullet for an approved Memory
pub fn format_memory_entry(memory: &Memory, date: &str) -> String {
    let mut line = format!("- [{}] {}", memory.memory_type, memory.content.trim());
    if let Some(context) = memory.context.as_deref().filter(|c| !c.trim().is_empty()) {
        line.push_str(&format!(" ({})", context.trim()));
    }
    for tag in &memory.tags {
        line.push_str(&format!(" #{}", tag.trim().replace(' ', "-")));
    }
    line.push_str(&format!(" _({})_", date));
    line
}

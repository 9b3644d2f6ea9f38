//! Coarse type/target extraction for Updates
//!
//! Picks an `UpdateKind` and a short target label by keyword matching:
//! known OEM names (configured, plus the sub-headings of the OEM section),
//! event names, contact verbs followed by a name, then priority words.
//! Anything else is a `general` update.

use crate::config::KnowledgeConfig;
use crate::error::{Error, Result};
use crate::knowledge::{subsection_titles, KnowledgeSnapshot};
use crate::records::UpdateKind;
use regex::Regex;

/// Longest target label derived from free text
const MAX_GENERAL_TARGET_CHARS: usize = 60;

/// Extracted kind and target of an Update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateTarget {
    pub kind: UpdateKind,
    pub target: String,
}

/// Keyword-based target extractor
pub struct TargetExtractor {
    oem_names: Vec<String>,
    event_names: Vec<String>,
    oem_section: Option<(String, String)>,
    contact: Regex,
    priority: Regex,
}

impl TargetExtractor {
    pub fn new(config: &KnowledgeConfig) -> Result<Self> {
        let contact = Regex::new(
            r"\b(?i:met with|meeting with|spoke with|spoke to|talked to|called|emailed|introduced to|intro to)\s+([A-Z][\w'-]*(?:\s+[A-Z][\w'-]*)?)",
        )
        .map_err(|e| Error::Config(format!("Invalid contact pattern: {}", e)))?;
        let priority = Regex::new(r"(?i)\b(priority|priorities|focus|goal|goals|okr|okrs|deadline)\b")
            .map_err(|e| Error::Config(format!("Invalid priority pattern: {}", e)))?;

        Ok(Self {
            oem_names: config.oem_names.clone(),
            event_names: config.event_names.clone(),
            oem_section: config
                .routes
                .get(UpdateKind::Oem.as_str())
                .map(|r| (r.document.clone(), r.section.clone())),
            contact,
            priority,
        })
    }

    /// Classify `text` into a kind and target
    pub fn extract(&self, text: &str, knowledge: &KnowledgeSnapshot) -> UpdateTarget {
        let mut oem_names = self.oem_names.clone();
        if let Some((document, section)) = &self.oem_section {
            if let Some(doc) = knowledge.get(document) {
                oem_names.extend(subsection_titles(doc, section));
            }
        }

        if let Some(name) = find_name(text, &oem_names) {
            return UpdateTarget {
                kind: UpdateKind::Oem,
                target: name,
            };
        }
        if let Some(name) = find_name(text, &self.event_names) {
            return UpdateTarget {
                kind: UpdateKind::Event,
                target: name,
            };
        }
        if let Some(caps) = self.contact.captures(text) {
            if let Some(name) = caps.get(1) {
                return UpdateTarget {
                    kind: UpdateKind::Contact,
                    target: name.as_str().to_string(),
                };
            }
        }
        if self.priority.is_match(text) {
            return UpdateTarget {
                kind: UpdateKind::Priority,
                target: "Current priorities".to_string(),
            };
        }

        UpdateTarget {
            kind: UpdateKind::General,
            target: general_target(text),
        }
    }
}

/// First name from `names` appearing as a whole word (case-insensitive)
fn find_name(text: &str, names: &[String]) -> Option<String> {
    let lower = text.to_lowercase();
    names
        .iter()
        .filter(|n| !n.trim().is_empty())
        .find(|name| {
            let needle = name.trim().to_lowercase();
            lower.match_indices(&needle).any(|(idx, _)| {
                let before = lower[..idx].chars().next_back();
                let after = lower[idx + needle.len()..].chars().next();
                !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
            })
        })
        .map(|n| n.trim().to_string())
}

fn general_target(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or("").trim();
    match first_line.char_indices().nth(MAX_GENERAL_TARGET_CHARS) {
        Some((idx, _)) => format!("{}...", first_line[..idx].trim_end()),
        None => first_line.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with(doc: &str) -> KnowledgeSnapshot {
        let mut snapshot = KnowledgeSnapshot::default();
        snapshot
            .documents
            .insert("customers".to_string(), doc.to_string());
        snapshot
    }

    fn extractor() -> TargetExtractor {
        let config = KnowledgeConfig {
            oem_names: vec!["Initech".to_string()],
            ..KnowledgeConfig::default()
        };
        TargetExtractor::new(&config).unwrap()
    }

    #[test]
    fn test_oem_from_config_and_document() {
        let snapshot = snapshot_with("## OEM Partners\n### Acme\n- pilot\n## Contacts\n");
        let x = extractor();

        assert_eq!(
            x.extract("Acme signed the contract", &snapshot),
            UpdateTarget {
                kind: UpdateKind::Oem,
                target: "Acme".to_string()
            }
        );
        assert_eq!(
            x.extract("initech renewed", &snapshot).kind,
            UpdateKind::Oem
        );
    }

    #[test]
    fn test_event() {
        let x = extractor();
        let target = x.extract("CES booth confirmed for Jan 7", &KnowledgeSnapshot::default());
        assert_eq!(target.kind, UpdateKind::Event);
        assert_eq!(target.target, "CES");
    }

    #[test]
    fn test_event_needs_whole_word() {
        let x = extractor();
        let target = x.extract("processes are confirmed", &KnowledgeSnapshot::default());
        assert_eq!(target.kind, UpdateKind::General);
    }

    #[test]
    fn test_contact() {
        let x = extractor();
        let target = x.extract("met with Jane Doe about pricing", &KnowledgeSnapshot::default());
        assert_eq!(target.kind, UpdateKind::Contact);
        assert_eq!(target.target, "Jane Doe");
    }

    #[test]
    fn test_priority() {
        let x = extractor();
        let target = x.extract("Our top priority is now retention", &KnowledgeSnapshot::default());
        assert_eq!(target.kind, UpdateKind::Priority);
    }

    #[test]
    fn test_general_target_is_truncated() {
        let x = extractor();
        let text = "remember ".repeat(20);
        let target = x.extract(&text, &KnowledgeSnapshot::default());
        assert_eq!(target.kind, UpdateKind::General);
        assert!(target.target.ends_with("..."));
        assert!(target.target.chars().count() <= MAX_GENERAL_TARGET_CHARS + 3);
    }
}

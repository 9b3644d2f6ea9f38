//! Content sanitizer for known transcription errors
//!
//! A fixed table of case-insensitive whole-word substitutions, applied once
//! before an entry is filed.

use crate::error::{Error, Result};
use regex::Regex;

/// Compiled correction table
pub struct ContentSanitizer {
    corrections: Vec<(Regex, String)>,
}

impl ContentSanitizer {
    /// Compile a `(from, to)` correction table
    pub fn new(corrections: &[(String, String)]) -> Result<Self> {
        let mut compiled = Vec::with_capacity(corrections.len());
        for (from, to) in corrections {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(from.trim()));
            let re = Regex::new(&pattern).map_err(|e| {
                Error::Config(format!("Invalid correction pattern '{}': {}", from, e))
            })?;
            compiled.push((re, to.clone()));
        }
        Ok(Self {
            corrections: compiled,
        })
    }

    /// Apply every correction in table order
    pub fn apply(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (re, to) in &self.corrections {
            if re.is_match(&out) {
                out = re.replace_all(&out, regex::NoExpand(to)).into_owned();
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_corrections;

    fn table(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn test_case_insensitive_whole_word() {
        let sanitizer = ContentSanitizer::new(&table(&[("sales force", "Salesforce")])).unwrap();
        assert_eq!(
            sanitizer.apply("Synced with SALES FORCE today"),
            "Synced with Salesforce today"
        );
        assert_eq!(sanitizer.apply("salesforces"), "salesforces");
    }

    #[test]
    fn test_no_partial_word_match() {
        let sanitizer = ContentSanitizer::new(&table(&[("ces", "CES")])).unwrap();
        assert_eq!(sanitizer.apply("processes at ces"), "processes at CES");
    }

    #[test]
    fn test_special_characters_are_literal() {
        let sanitizer = ContentSanitizer::new(&table(&[("a.b", "A-B")])).unwrap();
        assert_eq!(sanitizer.apply("a.b and axb"), "A-B and axb");
    }

    #[test]
    fn test_replacement_is_not_expanded() {
        let sanitizer = ContentSanitizer::new(&table(&[("price", "$1")])).unwrap();
        assert_eq!(sanitizer.apply("the price"), "the $1");
    }

    #[test]
    fn test_default_table_is_deterministic() {
        let sanitizer = ContentSanitizer::new(&default_corrections()).unwrap();
        let once = sanitizer.apply("know claw and git hub");
        assert_eq!(once, "KnowClaw and GitHub");
        assert_eq!(sanitizer.apply(&once), once);
    }
}

//! Hybrid intent classifier
//!
//! Decides whether a chat message asks for knowledge to be recorded:
//!
//! 1. Query screen: a rejecting `query` rule (question words, trailing `?`)
//!    ends classification with `false`.
//! 2. Update gate: without an accepting `update` rule the answer is `false`.
//! 3. One confirming completion call. `true` iff the reply contains `YES`.
//!    A failed or timed-out call yields the configured fallback (`true` by
//!    default, so a real update is never silently dropped).
//!
//! The admin-correction detector is independent and uses the `correction`
//! rules only.

use crate::config::{IntentConfig, IntentRule, Polarity, RuleStage};
use crate::error::{Error, Result};
use crate::llm::{with_timeout, Completion};
use regex::Regex;
use std::sync::Arc;

/// Token budget for the YES/NO confirmation
const CONFIRM_MAX_TOKENS: u32 = 5;

/// Outcome of the rule stages, before any capability call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefilter {
    /// Matched a query rule
    Query,
    /// No update rule matched
    NoSignal,
    /// Passed the update gate; needs confirmation
    Candidate,
}

struct CompiledRule {
    name: String,
    pattern: Regex,
    polarity: Polarity,
    stage: RuleStage,
}

/// Intent classifier backed by a rule table and a completion capability
pub struct IntentClassifier {
    rules: Vec<CompiledRule>,
    completion: Arc<dyn Completion>,
    confirm_timeout_secs: u64,
    fallback_on_error: bool,
}

impl IntentClassifier {
    /// Compile the configured rule table
    pub fn new(config: &IntentConfig, completion: Arc<dyn Completion>) -> Result<Self> {
        let rules = config
            .rules
            .iter()
            .map(|rule: &IntentRule| {
                let pattern = Regex::new(&rule.pattern).map_err(|e| {
                    Error::Config(format!(
                        "Invalid regex pattern for intent rule '{}': {}",
                        rule.name, e
                    ))
                })?;
                Ok(CompiledRule {
                    name: rule.name.clone(),
                    pattern,
                    polarity: rule.polarity,
                    stage: rule.stage,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            rules,
            completion,
            confirm_timeout_secs: config.confirm_timeout_secs,
            fallback_on_error: config.fallback_on_error,
        })
    }

    /// First rule of `stage` matching `text`, in table order
    fn first_match(&self, stage: RuleStage, text: &str) -> Option<&CompiledRule> {
        self.rules
            .iter()
            .filter(|r| r.stage == stage)
            .find(|r| r.pattern.is_match(text))
    }

    /// Run the local rule stages only
    pub fn prefilter(&self, text: &str) -> Prefilter {
        if let Some(rule) = self.first_match(RuleStage::Query, text) {
            if rule.polarity == Polarity::Reject {
                tracing::debug!(rule = %rule.name, "Message screened as a query");
                return Prefilter::Query;
            }
        }

        match self.first_match(RuleStage::Update, text) {
            Some(rule) if rule.polarity == Polarity::Accept => {
                tracing::debug!(rule = %rule.name, "Message passed the update gate");
                Prefilter::Candidate
            }
            _ => Prefilter::NoSignal,
        }
    }

    /// Is this message a knowledge-mutation request?
    pub async fn classify(&self, text: &str) -> bool {
        if self.prefilter(text) != Prefilter::Candidate {
            return false;
        }

        let prompt = confirm_prompt(text);
        let reply = with_timeout(
            self.confirm_timeout_secs,
            self.completion.complete(&prompt, CONFIRM_MAX_TOKENS),
        )
        .await;

        match reply {
            Ok(reply) => reply.to_uppercase().contains("YES"),
            Err(e) => {
                tracing::warn!(
                    "Intent confirmation failed, falling back to {}: {}",
                    self.fallback_on_error,
                    e
                );
                self.fallback_on_error
            }
        }
    }

    /// Does this message use corrective language?
    pub fn is_admin_correction(&self, text: &str) -> bool {
        matches!(
            self.first_match(RuleStage::Correction, text),
            Some(rule) if rule.polarity == Polarity::Accept
        )
    }
}

fn confirm_prompt(text: &str) -> String {
    format!(
        "You are classifying a message sent to a team knowledge assistant.\n\
         Answer YES if the message records new information (a status change, \
         a decision, a new fact, a contact, a date) that should be saved.\n\
         Answer NO if it asks a question, requests information, or is general chat.\n\
         Reply with exactly one word: YES or NO.\n\n\
         Message: \"{}\"",
        text.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticCompletion;

    fn classifier(completion: StaticCompletion) -> IntentClassifier {
        IntentClassifier::new(&IntentConfig::default(), Arc::new(completion)).unwrap()
    }

    #[test]
    fn test_prefilter_stages() {
        let c = classifier(StaticCompletion::new("YES"));
        assert_eq!(c.prefilter("what's our CES status?"), Prefilter::Query);
        assert_eq!(c.prefilter("Is Acme signed?"), Prefilter::Query);
        assert_eq!(c.prefilter("show me the priorities"), Prefilter::Query);
        assert_eq!(c.prefilter("good morning team"), Prefilter::NoSignal);
        assert_eq!(
            c.prefilter("CES booth confirmed for Jan 7"),
            Prefilter::Candidate
        );
        assert_eq!(c.prefilter("Met with Jane from Acme"), Prefilter::Candidate);
    }

    #[tokio::test]
    async fn test_question_is_never_an_update() {
        let completion = StaticCompletion::new("YES");
        let c = classifier(completion.clone());
        assert!(!c.classify("what's our CES status?").await);
        assert!(completion.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_confirmed_update() {
        let c = classifier(StaticCompletion::new("YES"));
        assert!(c.classify("CES booth confirmed for Jan 7").await);
    }

    #[tokio::test]
    async fn test_confirmation_says_no() {
        let c = classifier(StaticCompletion::new("NO"));
        assert!(!c.classify("CES booth confirmed for Jan 7").await);
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_true() {
        let c = classifier(StaticCompletion::failing());
        assert!(c.classify("CES booth confirmed for Jan 7").await);
    }

    #[tokio::test]
    async fn test_fallback_is_tunable() {
        let config = IntentConfig {
            fallback_on_error: false,
            ..Default::default()
        };
        let c = IntentClassifier::new(&config, Arc::new(StaticCompletion::failing())).unwrap();
        assert!(!c.classify("CES booth confirmed for Jan 7").await);
    }

    #[tokio::test]
    async fn test_timeout_falls_back() {
        let config = IntentConfig {
            confirm_timeout_secs: 0,
            ..Default::default()
        };
        let completion = StaticCompletion::new("NO").with_delay_ms(200);
        let c = IntentClassifier::new(&config, Arc::new(completion)).unwrap();
        assert!(c.classify("CES booth confirmed for Jan 7").await);
    }

    #[tokio::test]
    async fn test_no_signal_skips_confirmation() {
        let completion = StaticCompletion::new("YES");
        let c = classifier(completion.clone());
        assert!(!c.classify("thanks everyone").await);
        assert!(completion.prompts().is_empty());
    }

    #[test]
    fn test_admin_correction() {
        let c = classifier(StaticCompletion::new("YES"));
        assert!(c.is_admin_correction("Actually it's Jan 8, not Jan 7"));
        assert!(c.is_admin_correction("The Acme contact should be Jane"));
        assert!(c.is_admin_correction("that's wrong, Globex churned"));
        assert!(!c.is_admin_correction("CES booth confirmed for Jan 7"));
    }

    #[test]
    fn test_invalid_rule_is_config_error() {
        let config = IntentConfig {
            rules: vec![IntentRule::new(
                "broken",
                "(unclosed",
                Polarity::Accept,
                RuleStage::Update,
            )],
            ..Default::default()
        };
        let result = IntentClassifier::new(&config, Arc::new(StaticCompletion::new("YES")));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}

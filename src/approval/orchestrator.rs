//! Approval orchestrator
//!
//! Every knowledge mutation passes through one gate:
//!
//! ```text
//! message ──► thread trigger? ──► ThreadExtractor ──► MemoryCandidate ─┐
//!        └──► admin correction? ─────────────────────► Update ─────────┤
//!        └──► IntentClassifier ──────────────────────► Update ─────────┤
//!                                                                        ▼
//!                                      reviewer notified (approve / edit / reject)
//!                                                                        │
//!            approve ──► conditional transition ──► DocumentPatcher ──► submitter notified
//!            reject  ──► conditional transition ──────────────────────► submitter notified
//! ```
//!
//! A transition that finds the record missing or already processed is an
//! expected outcome of double clicks and stale buttons; the actor gets an
//! informational reply.

use super::action::{ActionId, ActionVerb, RecordFamily};
use super::render::{
    candidate_edit_form, candidate_review_text, parse_memory_lines, review_actions,
    update_edit_form, update_review_text, FIELD_MEMORIES, FIELD_TARGET, FIELD_VALUE,
};
use crate::channels::{
    ActionEvent, ChannelAdapter, FormSubmission, InboundMessage, MessageKind, OutboundMessage,
};
use crate::config::KnowClawConfig;
use crate::error::{Error, Result};
use crate::extract::ThreadExtractor;
use crate::intent::{IntentClassifier, TargetExtractor};
use crate::knowledge::{DocumentPatcher, KnowledgeBase, PatchReport};
use crate::llm::Completion;
use crate::records::{
    Memory, MemoryCandidate, NewMemoryCandidate, NewUpdate, RecordStatus, RecordStore,
    ThreadMessage, Transition, Update,
};
use std::sync::Arc;

/// Source label of Updates raised by the classifier
pub const SOURCE_MESSAGE: &str = "message";
/// Source label of Updates raised by an administrator's correction
pub const SOURCE_ADMIN_CORRECTION: &str = "admin_correction";
/// Source label of MemoryCandidates extracted from a thread
pub const SOURCE_THREAD: &str = "thread";

/// What happened to an inbound message
#[derive(Debug, Clone)]
pub enum MessageOutcome {
    /// Queued as an Update from the intent classifier
    UpdateQueued(Update),
    /// Queued as an Update from an administrator's correction
    CorrectionQueued(Update),
    /// Thread extraction queued a MemoryCandidate
    MemoryQueued(MemoryCandidate),
    /// Thread extraction found nothing worth remembering
    NothingExtracted,
    /// The thread could not be fetched from the channel
    ThreadUnavailable,
    /// Not a knowledge mutation; handled as conversation
    NotRouted,
}

/// Result of filing an approved record
#[derive(Debug, Clone)]
pub enum Filing {
    Filed(PatchReport),
    /// Nothing needed filing
    Skipped,
    Failed(String),
}

impl Filing {
    pub fn needs_follow_up(&self) -> bool {
        match self {
            Self::Filed(report) => report.needs_follow_up(),
            Self::Skipped => false,
            Self::Failed(_) => true,
        }
    }
}

/// What happened to a reviewer action
#[derive(Debug, Clone)]
pub enum ActionOutcome {
    UpdateApproved { update: Update, filing: Filing },
    MemoriesApproved { memories: Vec<Memory>, filing: Filing },
    Rejected { record_id: String },
    FormOpened { record_id: String },
    /// Edit produced nothing usable; the record stays pending
    EditRefused { record_id: String },
    /// Missing or no longer pending
    AlreadyProcessed { record_id: String },
    /// Unrecognised action ID
    Ignored,
}

/// Drives records from inbound message to filed knowledge
pub struct ApprovalOrchestrator {
    records: RecordStore,
    knowledge: Arc<KnowledgeBase>,
    classifier: IntentClassifier,
    targets: TargetExtractor,
    extractor: ThreadExtractor,
    patcher: DocumentPatcher,
    channel: Arc<dyn ChannelAdapter>,
    reviewer_id: String,
    admin_ids: Vec<String>,
    thread_triggers: Vec<String>,
}

impl ApprovalOrchestrator {
    /// Assemble the pipeline from configuration
    pub fn from_config(
        config: &KnowClawConfig,
        records: RecordStore,
        knowledge: Arc<KnowledgeBase>,
        completion: Arc<dyn Completion>,
        channel: Arc<dyn ChannelAdapter>,
    ) -> Result<Self> {
        if config.approval.reviewer_id.trim().is_empty() {
            return Err(Error::Config(
                "approval.reviewer_id must name the reviewer".to_string(),
            ));
        }
        let bot_user_id = config
            .slack
            .as_ref()
            .map(|s| s.bot_user_id.clone())
            .unwrap_or_default();

        Ok(Self {
            classifier: IntentClassifier::new(&config.intent, completion.clone())?,
            targets: TargetExtractor::new(&config.knowledge)?,
            extractor: ThreadExtractor::new(
                completion,
                bot_user_id,
                config.approval.extract_timeout_secs,
            ),
            patcher: DocumentPatcher::new(knowledge.clone(), &config.knowledge)?,
            records,
            knowledge,
            channel,
            reviewer_id: config.approval.reviewer_id.clone(),
            admin_ids: config.approval.admin_ids.clone(),
            thread_triggers: config
                .approval
                .thread_triggers
                .iter()
                .map(|t| t.to_lowercase())
                .collect(),
        })
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    // =========================================================================
    // Inbound messages
    // =========================================================================

    /// Route an inbound message into the approval queue, if it belongs there
    pub async fn handle_message(&self, msg: &InboundMessage) -> Result<MessageOutcome> {
        if msg.text.trim().is_empty() {
            return Ok(MessageOutcome::NotRouted);
        }

        if self.is_thread_trigger(msg) {
            return self.queue_thread(msg).await;
        }

        if self.admin_ids.iter().any(|a| a == &msg.author_id)
            && self.classifier.is_admin_correction(&msg.text)
        {
            let update = self.queue_update(msg, SOURCE_ADMIN_CORRECTION).await?;
            return Ok(MessageOutcome::CorrectionQueued(update));
        }

        if self.classifier.classify(&msg.text).await {
            let update = self.queue_update(msg, SOURCE_MESSAGE).await?;
            return Ok(MessageOutcome::UpdateQueued(update));
        }

        Ok(MessageOutcome::NotRouted)
    }

    /// Only an explicit mention can ask for a thread to be remembered
    fn is_thread_trigger(&self, msg: &InboundMessage) -> bool {
        if msg.kind != MessageKind::Mention {
            return false;
        }
        let text = msg.text.to_lowercase();
        self.thread_triggers.iter().any(|t| text.contains(t.as_str()))
    }

    async fn queue_update(&self, msg: &InboundMessage, source: &str) -> Result<Update> {
        let snapshot = self.knowledge.snapshot().await;
        let target = self.targets.extract(&msg.text, &snapshot);

        let update = self
            .records
            .create_update(NewUpdate {
                kind: target.kind,
                target: target.target,
                value: msg.text.trim().to_string(),
                submitted_by: msg.author_id.clone(),
                source: source.to_string(),
                channel: Some(msg.chat_id.clone()),
                thread_ref: msg.reply_thread(),
            })
            .await?;

        tracing::info!(
            record_id = %update.id,
            kind = %update.kind,
            source = %source,
            user = %msg.author_id,
            "Update queued for review"
        );

        self.notify(
            OutboundMessage::new(&self.reviewer_id, update_review_text(&update))
                .with_actions(review_actions(RecordFamily::Update, &update.id)),
        )
        .await;
        self.notify(
            OutboundMessage::new(
                &msg.chat_id,
                format!(
                    "Thanks! I've sent that update to a reviewer (`{}`).",
                    update.id
                ),
            )
            .in_thread(msg.reply_thread()),
        )
        .await;

        Ok(update)
    }

    async fn queue_thread(&self, msg: &InboundMessage) -> Result<MessageOutcome> {
        let thread_ref = msg.reply_thread().unwrap_or_default();
        let messages = if thread_ref.is_empty() {
            vec![ThreadMessage::new(&msg.author_id, &msg.text)]
        } else {
            match self.channel.fetch_thread(&msg.chat_id, &thread_ref).await {
                Ok(messages) => messages,
                Err(e) => {
                    tracing::warn!(
                        chat = %msg.chat_id,
                        thread = %thread_ref,
                        "Failed to fetch thread: {}",
                        e
                    );
                    self.notify(
                        OutboundMessage::new(
                            &msg.chat_id,
                            "I couldn't read this thread, so nothing was sent for review. Please try again later.",
                        )
                        .in_thread(msg.reply_thread()),
                    )
                    .await;
                    return Ok(MessageOutcome::ThreadUnavailable);
                }
            }
        };
        let label = match &msg.chat_label {
            Some(label) => label.clone(),
            None => self
                .channel
                .channel_label(&msg.chat_id)
                .await
                .unwrap_or_else(|| msg.chat_id.clone()),
        };

        let extracted = self.extractor.extract(&messages, &label).await;
        if extracted.is_empty() {
            self.notify(
                OutboundMessage::new(
                    &msg.chat_id,
                    "I didn't find anything in this thread worth remembering.",
                )
                .in_thread(msg.reply_thread()),
            )
            .await;
            return Ok(MessageOutcome::NothingExtracted);
        }

        let candidate = self
            .records
            .create_memory_candidate(NewMemoryCandidate {
                source: SOURCE_THREAD.to_string(),
                channel: label,
                channel_ref: msg.chat_id.clone(),
                thread_ref,
                raw_messages: messages,
                extracted_memories: extracted,
                submitted_by: msg.author_id.clone(),
            })
            .await?;

        tracing::info!(
            record_id = %candidate.id,
            items = candidate.extracted_memories.len(),
            user = %msg.author_id,
            "Memory candidate queued for review"
        );

        self.notify(
            OutboundMessage::new(&self.reviewer_id, candidate_review_text(&candidate))
                .with_actions(review_actions(RecordFamily::Memory, &candidate.id)),
        )
        .await;
        self.notify(
            OutboundMessage::new(
                &msg.chat_id,
                format!(
                    "Found {} thing(s) worth remembering; sent to a reviewer (`{}`).",
                    candidate.extracted_memories.len(),
                    candidate.id
                ),
            )
            .in_thread(msg.reply_thread()),
        )
        .await;

        Ok(MessageOutcome::MemoryQueued(candidate))
    }

    // =========================================================================
    // Reviewer actions
    // =========================================================================

    /// Handle a button press
    pub async fn handle_action(&self, event: &ActionEvent) -> Result<ActionOutcome> {
        let action: ActionId = match event.action_id.parse() {
            Ok(action) => action,
            Err(e) => {
                tracing::warn!("Ignoring unknown action {}: {}", event.action_id, e);
                return Ok(ActionOutcome::Ignored);
            }
        };
        tracing::debug!(action = %action, actor = %event.actor_id, "Handling review action");

        let actor = event.actor_id.as_str();
        match (action.verb, action.family) {
            (ActionVerb::Approve, RecordFamily::Update) => {
                self.approve_update(&action.record_id, actor).await
            }
            (ActionVerb::Approve, RecordFamily::Memory) => {
                self.approve_candidate(&action.record_id, actor).await
            }
            (ActionVerb::Reject, family) => self.reject(family, &action.record_id, actor).await,
            (ActionVerb::Edit, family) => {
                self.open_edit_form(family, &action.record_id, actor, event.trigger_ref.as_deref())
                    .await
            }
        }
    }

    /// Handle a submitted edit form: apply the edit, then approve
    pub async fn handle_form_submission(&self, form: &FormSubmission) -> Result<ActionOutcome> {
        let action: ActionId = match form.callback_id.parse() {
            Ok(action) => action,
            Err(e) => {
                tracing::warn!("Ignoring unknown form {}: {}", form.callback_id, e);
                return Ok(ActionOutcome::Ignored);
            }
        };
        let actor = form.actor_id.as_str();
        let id = action.record_id.as_str();

        match action.family {
            RecordFamily::Update => {
                let field = |name: &str| {
                    form.fields
                        .get(name)
                        .map(|v| v.trim())
                        .filter(|v| !v.is_empty())
                };
                let edited = self
                    .records
                    .edit_update(id, field(FIELD_TARGET), field(FIELD_VALUE), actor)
                    .await?;
                if edited == Transition::NoOp {
                    return self.already_processed(id, actor).await;
                }
                self.approve_update(id, actor).await
            }
            RecordFamily::Memory => {
                let items = form
                    .fields
                    .get(FIELD_MEMORIES)
                    .map(|text| parse_memory_lines(text))
                    .unwrap_or_default();
                if items.is_empty() {
                    self.notify(OutboundMessage::new(
                        actor,
                        format!(
                            "That edit had no valid memory lines (`type | content | context | tags`). `{}` is still pending.",
                            id
                        ),
                    ))
                    .await;
                    return Ok(ActionOutcome::EditRefused {
                        record_id: id.to_string(),
                    });
                }
                let edited = self.records.edit_memory_candidate(id, &items).await?;
                if edited == Transition::NoOp {
                    return self.already_processed(id, actor).await;
                }
                self.approve_candidate(id, actor).await
            }
        }
    }

    async fn approve_update(&self, id: &str, actor: &str) -> Result<ActionOutcome> {
        let transition = self
            .records
            .transition_update(id, RecordStatus::Approved, actor, None)
            .await?;
        if transition == Transition::NoOp {
            return self.already_processed(id, actor).await;
        }

        let update = self
            .records
            .get_update(id)
            .await?
            .ok_or_else(|| Error::Record(format!("approved update {} vanished", id)))?;

        let filing = match self.patcher.file_update(&update).await {
            Ok(report) => Filing::Filed(report),
            Err(e) => {
                tracing::error!("Filing approved update {} failed: {}", id, e);
                Filing::Failed(e.to_string())
            }
        };
        if let Some(note) = filing_note(&filing) {
            if let Err(e) = self.records.set_update_note(id, &note).await {
                tracing::warn!("Failed to record note on update {}: {}", id, e);
            }
        }

        self.notify(OutboundMessage::new(actor, reviewer_summary(&update.id, &filing)))
            .await;
        self.notify(OutboundMessage::new(
            &update.submitted_by,
            submitter_summary(
                &format!("Your update on *{}* was approved", update.target),
                &filing,
            ),
        ))
        .await;

        Ok(ActionOutcome::UpdateApproved { update, filing })
    }

    async fn approve_candidate(&self, id: &str, actor: &str) -> Result<ActionOutcome> {
        let Some(memories) = self.records.approve_memory_candidate(id, actor).await? else {
            return self.already_processed(id, actor).await;
        };
        let candidate = self.records.get_memory_candidate(id).await?;

        let filing = if memories.is_empty() {
            Filing::Skipped
        } else {
            match self.patcher.file_memories(&memories).await {
                Ok(report) => Filing::Filed(report),
                Err(e) => {
                    tracing::error!("Filing memories of candidate {} failed: {}", id, e);
                    Filing::Failed(e.to_string())
                }
            }
        };

        let ids = memories
            .iter()
            .map(|m| format!("`{}`", m.id))
            .collect::<Vec<_>>()
            .join(", ");
        self.notify(OutboundMessage::new(
            actor,
            format!(
                "{}\nCreated {} memories: {}",
                reviewer_summary(id, &filing),
                memories.len(),
                ids
            ),
        ))
        .await;

        if let Some(candidate) = candidate {
            self.notify(OutboundMessage::new(
                &candidate.submitted_by,
                submitter_summary(
                    &format!(
                        "{} memories from the thread in #{} were approved",
                        memories.len(),
                        candidate.channel
                    ),
                    &filing,
                ),
            ))
            .await;
        }

        Ok(ActionOutcome::MemoriesApproved { memories, filing })
    }

    async fn reject(&self, family: RecordFamily, id: &str, actor: &str) -> Result<ActionOutcome> {
        let transition = match family {
            RecordFamily::Update => {
                self.records
                    .transition_update(id, RecordStatus::Rejected, actor, None)
                    .await?
            }
            RecordFamily::Memory => {
                self.records
                    .transition_memory_candidate(id, RecordStatus::Rejected, actor)
                    .await?
            }
        };
        if transition == Transition::NoOp {
            return self.already_processed(id, actor).await;
        }

        let submitter = match family {
            RecordFamily::Update => self.records.get_update(id).await?.map(|u| {
                (
                    u.submitted_by,
                    format!("Your update on *{}* was not approved.", u.target),
                )
            }),
            RecordFamily::Memory => self.records.get_memory_candidate(id).await?.map(|c| {
                (
                    c.submitted_by,
                    format!("The memories from the thread in #{} were not approved.", c.channel),
                )
            }),
        };

        self.notify(OutboundMessage::new(actor, format!("Rejected `{}`.", id)))
            .await;
        if let Some((submitter, text)) = submitter {
            self.notify(OutboundMessage::new(submitter, text)).await;
        }

        Ok(ActionOutcome::Rejected {
            record_id: id.to_string(),
        })
    }

    async fn open_edit_form(
        &self,
        family: RecordFamily,
        id: &str,
        actor: &str,
        trigger_ref: Option<&str>,
    ) -> Result<ActionOutcome> {
        let form = match family {
            RecordFamily::Update => self
                .records
                .get_update(id)
                .await?
                .filter(|u| u.status == RecordStatus::Pending)
                .map(|u| update_edit_form(&u)),
            RecordFamily::Memory => self
                .records
                .get_memory_candidate(id)
                .await?
                .filter(|c| c.status == RecordStatus::Pending)
                .map(|c| candidate_edit_form(&c)),
        };
        let Some(form) = form else {
            return self.already_processed(id, actor).await;
        };

        self.channel.open_form(actor, trigger_ref, form).await?;
        Ok(ActionOutcome::FormOpened {
            record_id: id.to_string(),
        })
    }

    async fn already_processed(&self, id: &str, actor: &str) -> Result<ActionOutcome> {
        tracing::info!(record_id = %id, actor = %actor, "Record not found or already processed");
        self.notify(OutboundMessage::new(
            actor,
            format!("`{}` was not found or has already been processed.", id),
        ))
        .await;
        Ok(ActionOutcome::AlreadyProcessed {
            record_id: id.to_string(),
        })
    }

    /// Send a notification; failures are logged, never propagated
    async fn notify(&self, message: OutboundMessage) {
        let chat_id = message.chat_id.clone();
        if let Err(e) = self.channel.send_message(message).await {
            tracing::warn!("Failed to notify {}: {}", chat_id, e);
        }
    }
}

fn filing_note(filing: &Filing) -> Option<String> {
    match filing {
        Filing::Filed(report) => {
            let mut notes = Vec::new();
            if !report.section_found {
                notes.push(format!(
                    "section '{}' not found in {}; entry appended at end",
                    report.section, report.document
                ));
            }
            if let Some(e) = &report.sync_error {
                notes.push(format!("sync failed: {}", e));
            }
            (!notes.is_empty()).then(|| notes.join("; "))
        }
        Filing::Skipped => None,
        Filing::Failed(e) => Some(format!("filing failed: {}", e)),
    }
}

fn reviewer_summary(id: &str, filing: &Filing) -> String {
    match filing {
        Filing::Filed(report) if !report.needs_follow_up() => {
            format!("Approved `{}` and filed it in {} ({}).", id, report.document, report.section)
        }
        Filing::Skipped => format!("Approved `{}`.", id),
        _ => format!(
            "Approved `{}`, but filing needs manual follow-up: {}",
            id,
            filing_note(filing).unwrap_or_default()
        ),
    }
}

fn submitter_summary(headline: &str, filing: &Filing) -> String {
    if filing.needs_follow_up() {
        format!("{}, but manual follow-up is needed to file it.", headline)
    } else {
        format!("{}.", headline)
    }
}
